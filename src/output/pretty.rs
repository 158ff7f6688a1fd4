use std::fmt::Write as _;

use colored::Colorize;

use crate::domain::{format_clock, format_duration, render_progress_bar, Session, Step};
use crate::storage::{SessionRecord, SessionStats, SuccessLevel};

const RULE_WIDTH: usize = 50;
const BAR_WIDTH: usize = 20;

fn step_label(step: &Step, count: usize) -> String {
    if step.is_warmup(count) {
        format!("Warmup {}", step.index + 1)
    } else {
        "Target".to_string()
    }
}

fn display_user(user: &str) -> &str {
    if user.is_empty() {
        "(anonymous)"
    } else {
        user
    }
}

fn success_label(success: SuccessLevel) -> String {
    match success {
        SuccessLevel::Fail => "fail".red().to_string(),
        SuccessLevel::Ok => "ok".yellow().to_string(),
        SuccessLevel::Great => "great".green().to_string(),
    }
}

/// Format a step plan as a numbered list.
pub fn format_plan_pretty(steps: &[Step]) -> String {
    let count = steps.len();
    let total: u64 = steps.iter().map(|s| s.duration).sum();

    let mut output = format!(
        "{} ({} steps, {} total)\n",
        "Plan".bold(),
        count,
        format_duration(total)
    );
    output.push_str(&"─".repeat(RULE_WIDTH));
    output.push('\n');

    for step in steps {
        let label = step_label(step, count);
        let label = if step.is_warmup(count) {
            label.dimmed().to_string()
        } else {
            label.bold().to_string()
        };
        let _ = writeln!(
            output,
            "  {:>2}. {}  {}",
            step.index + 1,
            format_clock(step.duration),
            label
        );
    }

    output
}

/// One-line progress display for the running step.
pub fn format_progress(
    step_count: usize,
    index: usize,
    elapsed: u64,
    duration: u64,
    paused: bool,
) -> String {
    #[allow(clippy::cast_precision_loss)]
    let progress = if duration == 0 {
        1.0
    } else {
        elapsed as f64 / duration as f64
    };
    let label = if index + 1 < step_count {
        format!("Warmup {}", index + 1)
    } else {
        "Target".to_string()
    };
    let state = if paused {
        format!("  {}", "paused".yellow())
    } else {
        String::new()
    };

    format!(
        "[{}/{}] {:<9} {} {} / {}{}",
        index + 1,
        step_count,
        label,
        render_progress_bar(progress, BAR_WIDTH),
        format_clock(elapsed),
        format_clock(duration),
        state
    )
}

/// Summary printed when a session runs to the end.
pub fn format_record_pretty(record: &SessionRecord, saved: bool) -> String {
    let mut output = Vec::new();

    output.push(format!("{} Session complete!", "✓".green()).bold().to_string());
    output.push(format!("   Target:   {}", format_duration(record.target_sec)));
    output.push(format!(
        "   Trained:  {} over {} steps",
        format_duration(record.actual_total()),
        record.steps.len()
    ));
    output.push(format!("   Rating:   {}", success_label(record.success)));
    if !record.comment.is_empty() {
        output.push(format!("   Comment:  {}", record.comment));
    }
    output.push(String::new());
    if saved {
        output.push(format!("   Saved as {}", record.id).dimmed().to_string());
    } else {
        output.push("   Not saved (--no-save)".dimmed().to_string());
    }

    output.join("\n")
}

/// Summary printed when a session is abandoned.
pub fn format_abandoned_pretty(session: &Session) -> String {
    format!(
        "{} Session abandoned after {} of {} steps. Nothing was saved.",
        "✗".red(),
        session.completed_steps(),
        session.steps.len()
    )
}

/// Format finished sessions, newest first.
pub fn format_history_pretty(records: &[SessionRecord], user: &str) -> String {
    let title = format!("History for {}", display_user(user));
    if records.is_empty() {
        return format!("{title} (0 sessions)\n  No sessions yet");
    }

    let mut output = format!("{} ({} sessions)\n", title.bold(), records.len());
    output.push_str(&"─".repeat(RULE_WIDTH));
    output.push('\n');

    for record in records {
        let _ = write!(
            output,
            "{}  {:>8}  {:<5}  {}/{} steps",
            record
                .completed_at
                .format("%Y-%m-%d %H:%M")
                .to_string()
                .dimmed(),
            format_duration(record.target_sec),
            success_label(record.success),
            record.completed_steps(),
            record.steps.len()
        );
        if !record.comment.is_empty() {
            let _ = write!(output, "  {}", record.comment.italic());
        }
        output.push('\n');
    }

    output
}

/// Format aggregate statistics.
pub fn format_stats_pretty(stats: &SessionStats, user: &str) -> String {
    let mut output = Vec::new();

    output.push(format!("Stats for {}", display_user(user)).bold().to_string());
    output.push("─".repeat(RULE_WIDTH));
    output.push(format!("  Sessions:        {}", stats.total_sessions));
    output.push(format!("  Successful:      {}", stats.successful_count));
    output.push(format!("  Success rate:    {:.1}%", stats.success_rate));
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let average = stats.average_target.round() as u64;
    output.push(format!("  Average target:  {}", format_duration(average)));
    output.push(format!(
        "  Total time:      {}",
        format_duration(stats.total_train_time)
    ));

    output.join("\n")
}
