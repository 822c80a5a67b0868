use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use nufflizier_core::{AnalysisConfig, analyze_replay_input};
use std::path::PathBuf;
use std::process::Command;

fn temp_path(label: &str) -> PathBuf {
    std::env::temp_dir().join(format!(
        "nufflizier-cli-{label}-{}",
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos()
    ))
}

fn wrap(text: &str) -> String {
    STANDARD.encode(text)
}

fn sequence(step: &str, result: &str) -> String {
    format!(
        "<EventExecuteSequence><Sequence>\
         <Step><Name>step</Name><MessageData>{}</MessageData></Step>\
         <Results><StringMessage><Name>result</Name><MessageData>{}</MessageData>\
         </StringMessage></Results>\
         </Sequence></EventExecuteSequence>",
        wrap(&wrap(step)),
        wrap(result)
    )
}

fn dodge(player: &str, team: &str, difficulty: i32, face: i32, outcome: i32) -> String {
    sequence(
        &format!(
            "<MoveStep><StepType>1</StepType><PlayerId>{player}</PlayerId>\
             <TeamId>{team}</TeamId></MoveStep>"
        ),
        &format!(
            "<ResultRoll><RollType>3</RollType><Difficulty>{difficulty}</Difficulty>\
             <Outcome>{outcome}</Outcome>\
             <Dice><Die><DieType>2</DieType><Value>{face}</Value></Die></Dice></ResultRoll>"
        ),
    )
}

fn active_gamer(gamer: &str) -> String {
    format!(
        "<EventActiveGamerChanged><NewActiveGamer>{gamer}</NewActiveGamer>\
         </EventActiveGamerChanged>"
    )
}

/// A base64-wrapped upload with one made and one failed dodge.
fn upload() -> String {
    let mut xml = String::from(
        "<Replay><ReplayVersion>1-0-0-1</ReplayVersion><NotificationGameJoined><GameInfos>\
         <Id>cli-parity</Id><GamersInfos>",
    );
    for (id, name) in [("0", "Reavers"), ("1", "Marauders")] {
        xml.push_str(&format!(
            "<GamerInfos><Name>Coach {name}</Name>\
             <Roster><Name>{}</Name><TeamId>{id}</TeamId></Roster></GamerInfos>",
            wrap(name)
        ));
    }
    xml.push_str("</GamersInfos></GameInfos></NotificationGameJoined><ReplayStep>");
    xml.push_str(&active_gamer("0"));
    xml.push_str(&dodge("3", "0", 4, 5, 1));
    xml.push_str("<EventEndTurn><Reason>1</Reason></EventEndTurn>");
    xml.push_str(&active_gamer("1"));
    xml.push_str(&dodge("14", "1", 2, 1, 0));
    xml.push_str("<EventEndTurn><Reason>2</Reason></EventEndTurn></ReplayStep></Replay>");
    wrap(&xml)
}

fn write_upload(label: &str, contents: &str) -> PathBuf {
    let path = temp_path(label);
    std::fs::write(&path, contents).expect("write upload");
    path
}

#[test]
fn cli_json_matches_library_verdict_coverage_and_scores() {
    let exe = env!("CARGO_BIN_EXE_nufflizier");
    let input = upload();
    let replay_path = write_upload("parity", &input);
    let output = Command::new(exe)
        .args(["analyze", "--format", "json"])
        .arg(&replay_path)
        .output()
        .expect("run cli");
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let cli: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json report");
    let library = serde_json::to_value(
        analyze_replay_input(&input, &AnalysisConfig::default()).expect("library report"),
    )
    .expect("serialize");

    assert_eq!(cli["verdict"], library["verdict"]);
    assert_eq!(cli["coverage"], library["coverage"]);
    assert_eq!(cli["teams"][0]["luckScore"], library["teams"][0]["luckScore"]);
    assert_eq!(cli["teams"][1]["luckScore"], library["teams"][1]["luckScore"]);
    assert_eq!(cli["id"], library["id"]);
    assert_eq!(cli["verdict"]["luckierTeam"], "home");
}

#[test]
fn cli_writes_markdown_report_to_file() {
    let exe = env!("CARGO_BIN_EXE_nufflizier");
    let replay_path = write_upload("markdown", &upload());
    let output_path = temp_path("markdown-out");
    let status = Command::new(exe)
        .args(["analyze", "--format", "markdown", "--output"])
        .arg(&output_path)
        .arg(&replay_path)
        .status()
        .expect("run cli");
    assert!(status.success());
    let content = std::fs::read_to_string(output_path).expect("read output");
    assert!(content.starts_with("# Nuffle Luck Report: Reavers vs Marauders"));
    assert!(content.contains("## Key moments"));
}

#[test]
fn cli_text_report_prints_banner() {
    let exe = env!("CARGO_BIN_EXE_nufflizier");
    let replay_path = write_upload("text", &upload());
    let output = Command::new(exe)
        .arg("analyze")
        .arg(&replay_path)
        .env("NO_COLOR", "1")
        .output()
        .expect("run cli");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Nufflizier"));
    assert!(stdout.contains("Reavers was decisively blessed by Nuffle."));
}

#[test]
fn cli_replay_scopes_to_one_team() {
    let exe = env!("CARGO_BIN_EXE_nufflizier");
    let replay_path = write_upload("replay", &upload());
    let output = Command::new(exe)
        .args(["replay", "--team", "1"])
        .arg(&replay_path)
        .output()
        .expect("run cli");
    assert!(output.status.success());
    let dump: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json dump");
    assert_eq!(dump["replay"]["analysisTeamId"], "1");
    assert_eq!(dump["replay"]["matchId"], "cli-parity");
    let timeline = dump["timeline"].as_array().expect("timeline");
    assert_eq!(timeline.len(), dump["replay"]["turns"].as_array().expect("turns").len());

    let missing = Command::new(exe)
        .args(["replay", "--team", "7"])
        .arg(&replay_path)
        .output()
        .expect("run cli");
    assert!(!missing.status.success());
}

#[test]
fn cli_lists_contracts() {
    let exe = env!("CARGO_BIN_EXE_nufflizier");
    let output = Command::new(exe).arg("contracts").output().expect("run cli");
    assert!(output.status.success());
    let contracts: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json");
    let contracts = contracts.as_array().expect("array");
    assert!(!contracts.is_empty());
    assert!(contracts.iter().all(|entry| entry["sourceTag"].is_string()));
}

#[test]
fn cli_reports_validation_failures_on_stderr() {
    let exe = env!("CARGO_BIN_EXE_nufflizier");
    let replay_path = write_upload("empty", "   \n");
    let output = Command::new(exe)
        .arg("analyze")
        .arg(&replay_path)
        .output()
        .expect("run cli");
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.starts_with("[nufflizier] "));

    let tight = Command::new(exe)
        .args(["analyze", "--max-decoded-chars", "16"])
        .arg(write_upload("tight", &upload()))
        .output()
        .expect("run cli");
    assert!(!tight.status.success());
}
