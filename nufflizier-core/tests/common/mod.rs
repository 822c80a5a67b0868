//! Replay fixture builders shared by the integration tests.
#![allow(dead_code)]

use std::fmt::Write as _;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;

pub fn wrap(text: &str) -> String {
    STANDARD.encode(text)
}

/// One execute-sequence marker: a double-wrapped step plus single-wrapped results.
pub fn sequence(step: &str, results: &[String]) -> String {
    let mut block = format!(
        "<EventExecuteSequence><Sequence>\
         <Step><Name>step</Name><MessageData>{}</MessageData></Step><Results>",
        wrap(&wrap(step))
    );
    for result in results {
        let _ = write!(
            block,
            "<StringMessage><Name>result</Name><MessageData>{}</MessageData></StringMessage>",
            wrap(result)
        );
    }
    block.push_str("</Results></Sequence></EventExecuteSequence>");
    block
}

pub fn move_step(player: &str, team: Option<&str>) -> String {
    let team = team.map(|id| format!("<TeamId>{id}</TeamId>")).unwrap_or_default();
    format!("<MoveStep><StepType>1</StepType><PlayerId>{player}</PlayerId>{team}</MoveStep>")
}

pub fn block_step(player: &str, target: &str, team: &str) -> String {
    format!(
        "<BlockStep><StepType>6</StepType><PlayerId>{player}</PlayerId>\
         <TargetId>{target}</TargetId><TeamId>{team}</TeamId></BlockStep>"
    )
}

/// A `ResultRoll` with six-sided dice.
pub fn roll(roll_type: i32, difficulty: i32, faces: &[i32], outcome: Option<i32>) -> String {
    let dice: String = faces
        .iter()
        .map(|face| format!("<Die><DieType>2</DieType><Value>{face}</Value></Die>"))
        .collect();
    let outcome = outcome
        .map(|code| format!("<Outcome>{code}</Outcome>"))
        .unwrap_or_default();
    format!(
        "<ResultRoll><RollType>{roll_type}</RollType><Difficulty>{difficulty}</Difficulty>\
         {outcome}<Dice>{dice}</Dice></ResultRoll>"
    )
}

pub fn end_turn(reason: i32) -> String {
    format!(
        "<EventEndTurn><Reason>{reason}</Reason>\
         <FinishingTurnType>0</FinishingTurnType></EventEndTurn>"
    )
}

pub fn active_gamer(gamer: &str) -> String {
    format!(
        "<EventActiveGamerChanged><NewActiveGamer>{gamer}</NewActiveGamer>\
         </EventActiveGamerChanged>"
    )
}

pub fn carrier(player: &str) -> String {
    format!("<Carrier>{player}</Carrier>")
}

/// Full replay document with two named teams, an optional roster and a marker stream.
pub fn replay_xml(
    match_id: &str,
    teams: [(&str, &str); 2],
    players: &[(&str, &str, &str)],
    stream: &[String],
) -> String {
    let mut xml = String::from(
        "<Replay><ReplayVersion>1-0-0-1</ReplayVersion><NotificationGameJoined><GameInfos>",
    );
    let _ = write!(xml, "<Id>{match_id}</Id><GamersInfos>");
    for (id, name) in teams {
        let _ = write!(
            xml,
            "<GamerInfos><Name>Coach {name}</Name>\
             <Roster><Name>{}</Name><TeamId>{id}</TeamId></Roster></GamerInfos>",
            wrap(name)
        );
    }
    xml.push_str("</GamersInfos></GameInfos><InitialBoardState><ListTeams>");
    for (team_id, _) in teams {
        let _ = write!(xml, "<TeamState><Data><TeamId>{team_id}</TeamId></Data><ListPitchPlayers>");
        for (_, player_id, name) in players.iter().filter(|(team, _, _)| *team == team_id) {
            let _ = write!(
                xml,
                "<PlayerState><Id>{player_id}</Id><Data><Name>{name}</Name></Data></PlayerState>"
            );
        }
        xml.push_str("</ListPitchPlayers></TeamState>");
    }
    xml.push_str("</ListTeams></InitialBoardState></NotificationGameJoined><ReplayStep>");
    for marker in stream {
        xml.push_str(marker);
    }
    xml.push_str("</ReplayStep></Replay>");
    xml
}

/// Two turns: a 4+ dodge made by the home team, a 2+ dodge failed by the away team.
pub fn dodge_pair_xml() -> String {
    replay_xml(
        "dodge-pair",
        [("0", "Reavers"), ("1", "Marauders")],
        &[("0", "3", "Grak"), ("1", "14", "Lissa")],
        &[
            active_gamer("0"),
            sequence(&move_step("3", Some("0")), &[roll(3, 4, &[5], Some(1))]),
            end_turn(1),
            active_gamer("1"),
            sequence(&move_step("14", Some("1")), &[roll(3, 2, &[1], Some(0))]),
            end_turn(2),
        ],
    )
}
