//! Structured event extraction.
//!
//! The replay stream is scanned for four marker blocks. Execute-sequence blocks
//! carry a step descriptor and result payloads, each base64 wrapped XML that is
//! peeled and parsed on its own. Everything unrecognised is counted, never fatal.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::Regex;
use roxmltree::{Document, Node};
use smallvec::SmallVec;

use super::decode::peel_layers;
use super::mappings::{CodeCategory, MANUAL_END_REASON};
use super::xml::{children_named, element_children, field, int_field, is_leaf, leaf_text, parse_int};
use super::{
    Die, EventPayload, Modifier, PayloadDetail, ReplayEvent, ReplayEventKind, ReplayTurn,
    RerollFields, RollFields, UnknownCode,
};
use crate::contracts::roll_type_contract;

/// Nested payloads are wrapped at most this many times.
const NESTED_DECODE_PASSES: u8 = 2;

const PROMOTED_FIELDS: &[&str] = &[
    "PlayerId",
    "PushedPlayerId",
    "TargetId",
    "TeamId",
    "GamerId",
    "Action",
    "StepType",
    "RollType",
    "Requirement",
    "Difficulty",
    "Outcome",
    "Dice",
    "Modifiers",
    "CanUseTeamReroll",
    "CanUseProReroll",
    "Used",
];

/// Turns recovered from marker blocks plus the unmapped-code inventory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedTurns {
    pub turns: Vec<ReplayTurn>,
    pub unknown_codes: Vec<UnknownCode>,
}

pub(super) fn cached(
    cell: &'static OnceLock<Option<Regex>>,
    pattern: &str,
) -> Option<&'static Regex> {
    cell.get_or_init(|| Regex::new(pattern).ok()).as_ref()
}

fn marker_pattern() -> Option<&'static Regex> {
    static CELL: OnceLock<Option<Regex>> = OnceLock::new();
    cached(
        &CELL,
        r"<(EventExecuteSequence|EventEndTurn|EventActiveGamerChanged|Carrier)>",
    )
}

fn step_message_pattern() -> Option<&'static Regex> {
    static CELL: OnceLock<Option<Regex>> = OnceLock::new();
    cached(
        &CELL,
        r"<Step><Name>[^<]*</Name><MessageData>([^<]*)</MessageData>",
    )
}

fn result_message_pattern() -> Option<&'static Regex> {
    static CELL: OnceLock<Option<Regex>> = OnceLock::new();
    cached(
        &CELL,
        r"<StringMessage><Name>[^<]*</Name><MessageData>([^<]*)</MessageData></StringMessage>",
    )
}

#[derive(Debug, Default)]
struct UnknownCodeCounter {
    counts: BTreeMap<(CodeCategory, i32), usize>,
}

impl UnknownCodeCounter {
    fn observe(&mut self, category: CodeCategory, code: Option<i32>) {
        if let Some(code) = code
            && !category.is_known(code)
        {
            *self.counts.entry((category, code)).or_insert(0) += 1;
        }
    }

    fn observe_roll(&mut self, source_tag: &str, roll_type: Option<i32>) {
        if roll_type_contract(source_tag, roll_type).is_none() {
            self.observe(CodeCategory::Roll, roll_type);
        }
    }

    fn into_sorted(self) -> Vec<UnknownCode> {
        let mut codes: Vec<UnknownCode> = self
            .counts
            .into_iter()
            .map(|((category, code), occurrences)| UnknownCode {
                category,
                code,
                occurrences,
            })
            .collect();
        codes.sort_by(|a, b| b.occurrences.cmp(&a.occurrences));
        codes
    }
}

/// Identity fields a step descriptor shares with its result payloads.
#[derive(Debug, Default, Clone)]
struct StepContext {
    step_type: Option<i32>,
    player_id: Option<String>,
    target_id: Option<String>,
    team_id: Option<String>,
    gamer_id: Option<String>,
}

struct TurnAssembler {
    turns: Vec<ReplayTurn>,
    current: ReplayTurn,
    active_gamer: Option<String>,
    unknown: UnknownCodeCounter,
    found_markers: bool,
}

impl TurnAssembler {
    fn new() -> Self {
        Self {
            turns: Vec::new(),
            current: ReplayTurn::new(1),
            active_gamer: None,
            unknown: UnknownCodeCounter::default(),
            found_markers: false,
        }
    }

    fn on_active_gamer(&mut self, body: &str) {
        if let Some(gamer) = inline_tag_text(body, "NewActiveGamer") {
            self.active_gamer = Some(gamer.to_string());
            if self.current.gamer_id.is_none() {
                self.current.gamer_id = Some(gamer.to_string());
            }
        }
    }

    fn on_carrier(&mut self, body: &str) {
        let carrier = body.trim();
        if carrier.is_empty() || carrier == "-1" {
            return;
        }
        self.current.ball_carrier_player_id = Some(carrier.to_string());
        let mut event =
            ReplayEvent::new(ReplayEventKind::BallState, "Carrier").with_player(carrier);
        event.source_label = Some("ball_carrier".to_string());
        self.current.events.push(event);
    }

    fn on_sequence(&mut self, body: &str) {
        let events = collect_sequence_events(body, &mut self.unknown);
        if events.is_empty() {
            return;
        }
        if self.current.team_id.is_none() {
            self.current.team_id = events.iter().find_map(|event| {
                event
                    .team_id
                    .clone()
                    .or_else(|| event.actor_team_id().map(str::to_string))
            });
        }
        if self.current.gamer_id.is_none() {
            self.current.gamer_id = events.iter().find_map(|event| event.gamer_id.clone());
        }
        self.current.events.extend(events);
    }

    fn on_end_turn(&mut self, body: &str) {
        let reason = inline_tag_text(body, "Reason").and_then(parse_int);
        let finishing_turn_type = inline_tag_text(body, "FinishingTurnType").and_then(parse_int);
        let reason_label = CodeCategory::EndTurnReason.label_opt(reason);
        self.unknown.observe(CodeCategory::EndTurnReason, reason);

        self.current.end_turn_reason = reason;
        self.current.end_turn_reason_label.clone_from(&reason_label);
        self.current.finishing_turn_type = finishing_turn_type;

        if let Some(code) = reason
            && code != MANUAL_END_REASON
        {
            self.current.possible_turnover = true;
            let mut event = ReplayEvent::new(ReplayEventKind::Turnover, "EventEndTurn");
            event.source_label = Some("turn_end_non_manual".to_string());
            event.reason_code = Some(code);
            event.reason_label = reason_label;
            event.finishing_turn_type = finishing_turn_type;
            self.current.events.push(event);
        }

        let next_number = self.current.turn_number.saturating_add(1);
        let mut next = ReplayTurn::new(next_number);
        next.gamer_id.clone_from(&self.active_gamer);
        let mut finished = std::mem::replace(&mut self.current, next);
        finished.refresh_summary();
        self.turns.push(finished);
    }

    fn finish(mut self) -> ExtractedTurns {
        if !self.current.events.is_empty() || self.current.ball_carrier_player_id.is_some() {
            let mut trailing = self.current;
            trailing.refresh_summary();
            self.turns.push(trailing);
        }
        if !self.found_markers {
            self.turns.clear();
        }
        ExtractedTurns {
            turns: self.turns,
            unknown_codes: self.unknown.into_sorted(),
        }
    }
}

/// Scan replay XML text for marker blocks and rebuild turns with typed events.
///
/// Returns no turns when the document carries no markers at all; callers then
/// fall back to the generic tree walk.
#[must_use]
pub fn extract_structured_turns(xml: &str) -> ExtractedTurns {
    let mut assembler = TurnAssembler::new();
    let Some(markers) = marker_pattern() else {
        return assembler.finish();
    };

    let mut cursor = 0;
    while let Some(captures) = markers.captures_at(xml, cursor) {
        let (Some(whole), Some(tag)) = (captures.get(0), captures.get(1)) else {
            break;
        };
        let body_start = whole.end();
        let closing = format!("</{}>", tag.as_str());
        let Some(body_len) = xml[body_start..].find(&closing) else {
            cursor = body_start;
            continue;
        };
        let body = &xml[body_start..body_start + body_len];
        cursor = body_start + body_len + closing.len();
        assembler.found_markers = true;

        match tag.as_str() {
            "EventActiveGamerChanged" => assembler.on_active_gamer(body),
            "Carrier" => assembler.on_carrier(body),
            "EventExecuteSequence" => assembler.on_sequence(body),
            _ => assembler.on_end_turn(body),
        }
    }

    let extracted = assembler.finish();
    log::debug!(
        "extracted {} structured turns, {} unknown codes",
        extracted.turns.len(),
        extracted.unknown_codes.len()
    );
    extracted
}

/// Text between `<tag>` and `</tag>` in an unparsed fragment.
fn inline_tag_text<'a>(body: &'a str, tag: &str) -> Option<&'a str> {
    let open = format!("<{tag}>");
    let close = format!("</{tag}>");
    let start = body.find(&open)? + open.len();
    let len = body[start..].find(&close)?;
    let text = body[start..start + len].trim();
    (!text.is_empty()).then_some(text)
}

fn collect_sequence_events(block: &str, unknown: &mut UnknownCodeCounter) -> Vec<ReplayEvent> {
    let mut events = Vec::new();

    let step_xml = step_message_pattern()
        .and_then(|pattern| pattern.captures(block))
        .and_then(|captures| captures.get(1))
        .and_then(|data| peel_layers(data.as_str(), NESTED_DECODE_PASSES))
        .map(|(xml, _)| xml);
    let step_doc = step_xml.as_deref().and_then(|xml| parse_fragment(xml, "step"));

    let mut context = StepContext::default();
    if let Some(doc) = step_doc.as_ref() {
        let root = doc.root_element();
        context = StepContext {
            step_type: int_field(root, "StepType"),
            player_id: field(root, "PlayerId"),
            target_id: field(root, "TargetId"),
            team_id: field(root, "TeamId"),
            gamer_id: field(root, "GamerId"),
        };
        unknown.observe(CodeCategory::Step, context.step_type);

        if root.tag_name().name() == "BallStep" {
            let mut event = base_event(ReplayEventKind::BallState, "BallStep", &context);
            event.source_label = Some("ball_state_change".to_string());
            event.payload = Some(read_payload(root));
            events.push(event);
        }
    }

    let Some(results) = result_message_pattern() else {
        return events;
    };
    for captures in results.captures_iter(block) {
        let Some(data) = captures.get(1) else {
            continue;
        };
        let Some((xml, _)) = peel_layers(data.as_str(), NESTED_DECODE_PASSES) else {
            log::debug!("skipping result payload that does not decode to XML");
            continue;
        };
        let Some(doc) = parse_fragment(&xml, "result") else {
            continue;
        };
        if let Some(event) = result_event(doc.root_element(), &context, unknown) {
            events.push(event);
        }
    }

    events
}

fn parse_fragment<'input>(xml: &'input str, what: &str) -> Option<Document<'input>> {
    match Document::parse(xml) {
        Ok(doc) => Some(doc),
        Err(err) => {
            log::warn!("unreadable {what} payload: {err}");
            None
        }
    }
}

fn base_event(kind: ReplayEventKind, source_tag: &str, context: &StepContext) -> ReplayEvent {
    let mut event = ReplayEvent::new(kind, source_tag);
    event.step_type = context.step_type;
    event.step_label = CodeCategory::Step.label_opt(context.step_type);
    event.player_id.clone_from(&context.player_id);
    event.target_id.clone_from(&context.target_id);
    event.gamer_id.clone_from(&context.gamer_id);
    if let Some(team_id) = context.team_id.as_deref() {
        event = event.with_team(team_id);
    }
    event
}

fn classify_result(
    source_tag: &str,
    action_code: Option<i32>,
    step_type: Option<i32>,
) -> Option<(ReplayEventKind, &'static str)> {
    let mapped = match source_tag {
        "ResultBlockRoll" | "ResultBlockOutcome" | "ResultPushBack" => {
            (ReplayEventKind::Block, "block_resolution")
        }
        "ResultUseAction" => match action_code {
            Some(2) => (ReplayEventKind::Blitz, "declared_blitz"),
            Some(6) => (ReplayEventKind::Foul, "declared_foul"),
            _ => return None,
        },
        "ResultFoulRoll" | "ResultFoulOutcome" => (ReplayEventKind::Foul, "foul_resolution"),
        "ResultRoll" if step_type == Some(1) => (ReplayEventKind::Dodge, "dodge_roll"),
        "ResultRoll" => (ReplayEventKind::Roll, "generic_roll"),
        "QuestionTeamRerollUsage" | "ResultTeamRerollUsage" => {
            (ReplayEventKind::Reroll, "team_reroll")
        }
        "ResultInjuryRoll" | "ResultCasualtyRoll" | "ResultPlayerRemoval" => {
            (ReplayEventKind::Casualty, "injury_chain")
        }
        "ResultTouchBack" => (ReplayEventKind::BallState, "touchback"),
        _ => return None,
    };
    Some(mapped)
}

fn result_event(
    root: Node<'_, '_>,
    context: &StepContext,
    unknown: &mut UnknownCodeCounter,
) -> Option<ReplayEvent> {
    let source_tag = root.tag_name().name();
    let action_code = int_field(root, "Action");
    let roll_type = int_field(root, "RollType");
    unknown.observe(CodeCategory::Action, action_code);
    unknown.observe_roll(source_tag, roll_type);

    let (kind, source_label) = classify_result(source_tag, action_code, context.step_type)?;

    let scoped = StepContext {
        step_type: context.step_type,
        player_id: field(root, "PlayerId")
            .or_else(|| field(root, "PushedPlayerId"))
            .or_else(|| context.player_id.clone()),
        target_id: field(root, "TargetId").or_else(|| context.target_id.clone()),
        team_id: field(root, "TeamId").or_else(|| context.team_id.clone()),
        gamer_id: field(root, "GamerId").or_else(|| context.gamer_id.clone()),
    };
    let mut event = base_event(kind, source_tag, &scoped);
    event.source_label = Some(source_label.to_string());
    event.action_code = action_code;
    event.action_label = CodeCategory::Action.label_opt(action_code);
    event.roll_type = roll_type;
    event.roll_label = roll_type.map(|code| {
        roll_type_contract(source_tag, Some(code))
            .map_or_else(|| CodeCategory::Roll.label(code), |contract| contract.label.to_string())
    });
    event.payload = Some(read_payload(root));
    Some(event)
}

/// Promote known fields of a payload root and keep the remaining leaves as extras.
fn read_payload(root: Node<'_, '_>) -> EventPayload {
    let detail = match root.tag_name().name() {
        "QuestionTeamRerollUsage" | "ResultTeamRerollUsage" => PayloadDetail::Reroll(RerollFields {
            can_use_team_reroll: positive(int_field(root, "CanUseTeamReroll")),
            can_use_pro_reroll: positive(int_field(root, "CanUseProReroll")),
            used: positive(int_field(root, "Used")),
        }),
        _ if has_roll_shape(root) => PayloadDetail::Roll(read_roll_fields(root)),
        _ => PayloadDetail::Opaque,
    };

    let mut extra = BTreeMap::new();
    for attribute in root.attributes() {
        if !PROMOTED_FIELDS.contains(&attribute.name()) {
            extra
                .entry(attribute.name().to_string())
                .or_insert_with(|| attribute.value().trim().to_string());
        }
    }
    for node in element_children(root) {
        let name = node.tag_name().name();
        if PROMOTED_FIELDS.contains(&name) || !is_leaf(node) {
            continue;
        }
        if let Some(text) = leaf_text(node) {
            extra.entry(name.to_string()).or_insert(text);
        }
    }

    EventPayload { detail, extra }
}

fn positive(value: Option<i32>) -> bool {
    value.is_some_and(|value| value > 0)
}

fn has_roll_shape(root: Node<'_, '_>) -> bool {
    ["RollType", "Dice", "Requirement", "Difficulty"]
        .iter()
        .any(|name| root.attribute(*name).is_some() || children_named(root, name).next().is_some())
}

fn read_roll_fields(root: Node<'_, '_>) -> RollFields {
    let dice: SmallVec<[Die; 3]> = children_named(root, "Dice")
        .flat_map(|dice| children_named(dice, "Die"))
        .filter_map(|die| {
            int_field(die, "Value").map(|value| Die::new(value, int_field(die, "DieType")))
        })
        .collect();
    let modifiers = children_named(root, "Modifiers")
        .flat_map(|modifiers| children_named(modifiers, "Modifier"))
        .filter_map(|modifier| {
            int_field(modifier, "Value").map(|value| Modifier {
                value,
                skill: int_field(modifier, "Skill"),
            })
        })
        .collect();

    RollFields {
        roll_type: int_field(root, "RollType"),
        requirement: int_field(root, "Requirement"),
        difficulty: int_field(root, "Difficulty"),
        outcome: int_field(root, "Outcome"),
        dice,
        modifiers,
    }
}
