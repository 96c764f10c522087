use anyhow::Result;
use colored::Colorize;
use keyhole_game::{Finding, Severity, ValidationReport};
use std::io::Write;
use std::time::Duration;

fn total(reachable: usize, unreachable: usize) -> usize {
    reachable + unreachable
}

pub fn generate_console_report<W: Write>(
    writer: &mut W,
    reports: &[ValidationReport],
    verbose: bool,
    total_duration: Duration,
) -> Result<()> {
    writeln!(writer)?;
    writeln!(writer, "{}", "📊 Validation Results".bright_cyan().bold())?;
    writeln!(writer, "{}", "=====================".cyan())?;

    let valid = reports.iter().filter(|r| r.is_valid).count();
    let invalid = reports.len() - valid;
    writeln!(writer, "Experiences checked: {}", reports.len())?;
    writeln!(writer, "Valid: {}", valid.to_string().green())?;
    writeln!(writer, "Invalid: {}", invalid.to_string().red())?;
    writeln!(writer, "Total time: {total_duration:?}")?;
    writeln!(writer)?;

    for report in reports {
        let status = if report.is_valid {
            "✅ VALID".green()
        } else {
            "❌ INVALID".red()
        };
        writeln!(
            writer,
            "{} {} ({})",
            status,
            report.experience_name.bold(),
            report.experience_id
        )?;
        writeln!(
            writer,
            "   Passes: {} ({})",
            report.passes,
            if report.converged {
                "converged"
            } else {
                "ceiling reached"
            }
        )?;
        writeln!(
            writer,
            "   Items: {}/{} reachable, triggers: {}/{}, rooms: {}, keys: {}",
            report.reachable_items.len(),
            total(report.reachable_items.len(), report.unreachable_items.len()),
            report.reachable_triggers.len(),
            total(
                report.reachable_triggers.len(),
                report.unreachable_triggers.len()
            ),
            report.accessible_rooms.len(),
            report.available_keys.len()
        )?;

        for finding in &report.errors {
            writeln!(writer, "   {}", console_line(finding).red())?;
        }
        for finding in &report.warnings {
            writeln!(writer, "   {}", console_line(finding).yellow())?;
        }
        if verbose {
            for finding in &report.info {
                writeln!(writer, "   {}", console_line(finding).dimmed())?;
            }
            if !report.access_paths.is_empty() {
                writeln!(writer, "   Access paths:")?;
                for (item, path) in &report.access_paths {
                    writeln!(writer, "     • {item}: {}", path.join(" → "))?;
                }
            }
        }
        writeln!(writer)?;
    }
    Ok(())
}

fn console_line(finding: &Finding) -> String {
    let marker = match finding.severity {
        Severity::Error => "✗",
        Severity::Warning => "⚠",
        Severity::Info => "ℹ",
    };
    format!("{marker} [{}] {}", finding.category, finding.message)
}

pub fn generate_json_report<W: Write>(writer: &mut W, reports: &[ValidationReport]) -> Result<()> {
    let json_output = serde_json::to_string_pretty(reports)?;
    writeln!(writer, "{json_output}")?;
    Ok(())
}

pub fn generate_markdown_report<W: Write>(
    writer: &mut W,
    reports: &[ValidationReport],
) -> Result<()> {
    writeln!(writer, "# Keyhole Validation Report\n")?;

    let valid = reports.iter().filter(|r| r.is_valid).count();
    writeln!(writer, "## Summary\n")?;
    writeln!(writer, "- **Experiences**: {}", reports.len())?;
    writeln!(writer, "- **Valid**: {valid}")?;
    writeln!(writer, "- **Invalid**: {}\n", reports.len() - valid)?;

    for report in reports {
        let status = if report.is_valid { "✅" } else { "❌" };
        writeln!(
            writer,
            "## {status} {} (`{}`)\n",
            report.experience_name, report.experience_id
        )?;
        writeln!(
            writer,
            "- **Passes**: {}{}",
            report.passes,
            if report.converged { "" } else { " (did not converge)" }
        )?;
        writeln!(
            writer,
            "- **Reachable items**: {}/{}",
            report.reachable_items.len(),
            total(report.reachable_items.len(), report.unreachable_items.len())
        )?;
        writeln!(
            writer,
            "- **Reachable triggers**: {}/{}",
            report.reachable_triggers.len(),
            total(
                report.reachable_triggers.len(),
                report.unreachable_triggers.len()
            )
        )?;
        writeln!(writer, "- **Accessible rooms**: {}", report.accessible_rooms.len())?;
        writeln!(writer, "- **Available keys**: {}\n", report.available_keys.len())?;

        write_findings(writer, "Errors", &report.errors)?;
        write_findings(writer, "Warnings", &report.warnings)?;

        if !report.unreachable_items.is_empty() {
            writeln!(writer, "### Unreachable items\n")?;
            for item in &report.unreachable_items {
                writeln!(writer, "- `{item}`")?;
            }
            writeln!(writer)?;
        }
    }
    Ok(())
}

fn write_findings<W: Write>(writer: &mut W, heading: &str, findings: &[Finding]) -> Result<()> {
    if findings.is_empty() {
        return Ok(());
    }
    writeln!(writer, "### {heading}\n")?;
    for finding in findings {
        writeln!(writer, "- `{}` {}", finding.category, finding.message)?;
    }
    writeln!(writer)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use keyhole_game::{ExperienceDoc, ValidatorConfig, validate_document};

    const LOCKED_OUT: &str = r#"{
        "id": "locked_out", "name": "Locked Out", "startingRoomId": "porch",
        "rooms": [{"id": "porch", "name": "Porch", "items": [
            {"id": "mat", "name": "Doormat"},
            {"id": "door", "name": "Door", "category": "DOOR", "isLocked": true,
             "lockTriggerId": "door_keypad", "leadsTo": "porch"}]}],
        "triggers": [{"id": "door_keypad", "type": "KeypadLock", "code": "1234"}],
        "completionCriteria": [{"type": "trigger_activated", "triggerId": "door_keypad"}]
    }"#;

    fn report() -> ValidationReport {
        validate_document(
            &ExperienceDoc::from_json(LOCKED_OUT).unwrap(),
            &ValidatorConfig::default(),
        )
    }

    #[test]
    fn console_report_lists_errors_and_totals() {
        colored::control::set_override(false);
        let mut out = Vec::new();
        generate_console_report(&mut out, &[report()], false, Duration::from_millis(3)).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("❌ INVALID Locked Out (locked_out)"));
        assert!(text.contains("Invalid: 1"));
        assert!(text.contains("[reachability] Completion requires trigger \"door_keypad\""));
        assert!(!text.contains("Access paths"));
    }

    #[test]
    fn verbose_console_report_includes_info_and_paths() {
        colored::control::set_override(false);
        let mut out = Vec::new();
        generate_console_report(&mut out, &[report()], true, Duration::ZERO).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("ℹ [structure] Experience has 1 room(s)"));
        assert!(text.contains("Access paths:"));
        assert!(text.contains("• mat: porch → mat"));
    }

    #[test]
    fn markdown_report_has_sections() {
        let mut out = Vec::new();
        generate_markdown_report(&mut out, &[report()]).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("# Keyhole Validation Report"));
        assert!(text.contains("## ❌ Locked Out (`locked_out`)"));
        assert!(text.contains("### Errors"));
        assert!(text.contains("### Unreachable items"));
        assert!(text.contains("- `door`"));
    }

    #[test]
    fn json_report_is_an_array_of_reports() {
        let mut out = Vec::new();
        generate_json_report(&mut out, &[report()]).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(value[0]["experienceId"], "locked_out");
        assert_eq!(value[0]["isValid"], false);
        assert_eq!(value[0]["errors"][0]["type"], "error");
    }
}
