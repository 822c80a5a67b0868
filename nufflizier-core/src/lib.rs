//! Nufflizier Core
//!
//! Replay decoding, event extraction and deterministic luck scoring for
//! recorded tabletop sports matches. This crate is I/O free: callers hand it
//! upload text and receive a parsed replay model or a luck report.

pub mod analysis;
pub mod config;
pub mod contracts;
pub mod error;
pub mod fingerprint;
pub mod luck;
pub mod numbers;
pub mod replay;

// Re-export commonly used types
pub use analysis::{
    analyze_replay, analyze_replay_input, analyze_replay_input_at, analyze_replay_xml,
    parse_replay_input,
};
pub use config::{AnalysisConfig, CategoryWeights};
pub use contracts::{
    CONTRACT_REVISION, ContractKind, KnowledgeStatus, RollTypeContract, observed_contracts,
    roll_type_contract,
};
pub use error::{ConfigError, ReplayValidationError};
pub use luck::{
    Coverage, LuckCategory, LuckEvent, LuckReport, LuckTeamAggregate, LuckVerdict, LuckierTeam,
    ScoringStatus, analyze_luck, analyze_luck_at,
};
pub use replay::{
    Confidence, ReplayEvent, ReplayEventKind, ReplayModel, ReplayTurn, SourceFormat, Team,
    TimelineTurn, build_timeline, decode_replay_input, parse_replay_xml, scope_replay_to_team,
};
