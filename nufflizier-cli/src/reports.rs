use anyhow::Result;
use colored::Colorize;
use std::io::Write;

use nufflizier_core::{LuckEvent, LuckReport, LuckierTeam};

fn verdict_line(report: &LuckReport) -> String {
    match report.verdict.luckier_team {
        LuckierTeam::Home => format!("{} (home)", report.match_summary.home_team),
        LuckierTeam::Away => format!("{} (away)", report.match_summary.away_team),
        LuckierTeam::Even => "even".to_string(),
    }
}

fn success_mark(event: &LuckEvent) -> &'static str {
    match event.actual_success {
        Some(true) => "made",
        Some(false) => "failed",
        None => "unresolved",
    }
}

pub fn write_text_report(out: &mut impl Write, report: &LuckReport) -> Result<()> {
    let summary = &report.match_summary;
    writeln!(out)?;
    writeln!(
        out,
        "{}",
        format!("🎲 {} vs {}", summary.home_team, summary.away_team)
            .bright_cyan()
            .bold()
    )?;
    writeln!(out, "{}", "==============================".cyan())?;
    writeln!(out, "Match: {}  Report: {}", summary.id, report.id)?;
    writeln!(out, "Luckier team: {}", verdict_line(report).bold())?;
    writeln!(out, "Score gap: {:.1}", report.verdict.score_gap)?;
    writeln!(out, "{}", report.verdict.summary.italic())?;
    writeln!(out)?;

    for team in &report.teams {
        let score = format!("{:+.1}", team.luck_score);
        let score = if team.luck_score >= 0.0 {
            score.green()
        } else {
            score.red()
        };
        writeln!(
            out,
            "{} {}  ({} scored events)",
            team.team_name.bold(),
            score,
            team.event_count
        )?;
    }
    writeln!(out)?;

    let all = &report.coverage.all_events;
    let candidates = &report.coverage.roll_candidates;
    writeln!(out, "{}", "📈 Coverage".bright_yellow().bold())?;
    writeln!(out, "{}", "===========".yellow())?;
    writeln!(
        out,
        "All events: {} scored, {} excluded ({:.1}%)",
        all.scored_count,
        all.excluded_count,
        all.scored_rate * 100.0
    )?;
    writeln!(
        out,
        "Roll candidates: {} scored, {} excluded ({:.1}%)",
        candidates.scored_count,
        candidates.excluded_count,
        candidates.scored_rate * 100.0
    )?;
    for reason in report.coverage.excluded_by_reason.iter().take(3) {
        writeln!(out, "   • {} ×{}", reason.reason, reason.count)?;
    }
    writeln!(out)?;

    if !report.key_moments.is_empty() {
        writeln!(out, "{}", "⚡ Key Moments".bright_yellow().bold())?;
        writeln!(out, "{}", "=============".yellow())?;
        for moment in &report.key_moments {
            let delta = format!("{:+.3}", moment.weighted_delta);
            let delta = if moment.weighted_delta >= 0.0 {
                delta.green()
            } else {
                delta.red()
            };
            writeln!(
                out,
                "T{:<3} {:<24} {} {:>4.0}% {} {}",
                moment.turn,
                moment.team_name,
                success_mark(moment),
                moment.probability_success * 100.0,
                delta,
                moment.label
            )?;
        }
    }
    Ok(())
}

pub fn write_json_report(out: &mut impl Write, report: &LuckReport) -> Result<()> {
    serde_json::to_writer_pretty(&mut *out, report)?;
    writeln!(out)?;
    Ok(())
}

pub fn write_markdown_report(out: &mut impl Write, report: &LuckReport) -> Result<()> {
    let summary = &report.match_summary;
    writeln!(
        out,
        "# Nuffle Luck Report: {} vs {}\n",
        summary.home_team, summary.away_team
    )?;
    writeln!(out, "- **Match**: {}", summary.id)?;
    writeln!(out, "- **Report**: {}", report.id)?;
    writeln!(out, "- **Generated**: {}", report.generated_at)?;
    writeln!(out, "- **Luckier team**: {}", verdict_line(report))?;
    writeln!(out, "- **Score gap**: {:.1}\n", report.verdict.score_gap)?;
    writeln!(out, "> {}\n", report.verdict.summary)?;

    writeln!(out, "## Teams\n")?;
    writeln!(out, "| Team | Luck score | Scored events |")?;
    writeln!(out, "|---|---:|---:|")?;
    for team in &report.teams {
        writeln!(
            out,
            "| {} | {:.1} | {} |",
            team.team_name, team.luck_score, team.event_count
        )?;
    }
    writeln!(out)?;

    writeln!(out, "## How it was scored\n")?;
    for line in &report.how_scored_summary {
        writeln!(out, "- {line}")?;
    }
    writeln!(out)?;

    if !report.key_moments.is_empty() {
        writeln!(out, "## Key moments\n")?;
        writeln!(out, "| Turn | Team | Event | Chance | Result | Weighted delta |")?;
        writeln!(out, "|---:|---|---|---:|---|---:|")?;
        for moment in &report.key_moments {
            writeln!(
                out,
                "| {} | {} | {} | {:.0}% | {} | {:+.3} |",
                moment.turn,
                moment.team_name,
                moment.label,
                moment.probability_success * 100.0,
                success_mark(moment),
                moment.weighted_delta
            )?;
        }
        writeln!(out)?;
    }
    Ok(())
}
