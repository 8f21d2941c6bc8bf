//! Inbound commands to the gate service.
//!
//! Broker messages arrive as `<prefix><verb>/<gate id>` with a short text
//! payload.  [`parse`] turns one into a [`GateCommand`] or says exactly
//! why it couldn't; the [`GateService`](super::service::GateService)
//! never sees raw topic strings.

use core::fmt::{self, Write};

use crate::fsm::{LimitKind, Target};

/// Longest topic the firmware builds or accepts.
pub type Topic = heapless::String<48>;

/// Inbound topic verbs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    GateCmd,
    SetOpenPos,
    SetClosePos,
    /// Alias of `setclosepos` used by older dashboards.
    GateMin,
    /// Alias of `setopenpos` used by older dashboards.
    GateMax,
    Flash,
    Calibrate,
}

impl Verb {
    pub const ALL: [Verb; 7] = [
        Verb::GateCmd,
        Verb::SetOpenPos,
        Verb::SetClosePos,
        Verb::GateMin,
        Verb::GateMax,
        Verb::Flash,
        Verb::Calibrate,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::GateCmd => "gatecmd",
            Self::SetOpenPos => "setopenpos",
            Self::SetClosePos => "setclosepos",
            Self::GateMin => "gatemin",
            Self::GateMax => "gatemax",
            Self::Flash => "flash",
            Self::Calibrate => "calibrate",
        }
    }

    fn from_segment(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|v| v.as_str() == s)
    }
}

/// A validated command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateCommand {
    Move(Target),
    /// `verb` is kept so the acknowledgement can echo it.
    SetLimit {
        verb: Verb,
        kind: LimitKind,
        value: u16,
    },
    Flash,
    Calibrate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandError {
    /// Topic is malformed or addressed to another gate.
    ForeignTopic,
    UnknownVerb,
    EmptyPayload,
    NotANumber,
    /// Numeric payload above `u16::MAX`.
    OutOfRange,
    /// `gatecmd` payload other than open / close / middle.
    UnknownTarget,
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ForeignTopic => write!(f, "not addressed to this gate"),
            Self::UnknownVerb => write!(f, "unknown verb"),
            Self::EmptyPayload => write!(f, "empty string"),
            Self::NotANumber => write!(f, "not a number"),
            Self::OutOfRange => write!(f, "number out of range"),
            Self::UnknownTarget => write!(f, "unknown position"),
        }
    }
}

/// Parse one inbound message.
///
/// The topic prefix is optional so `gatecmd/11` and `/gatecmd/11` are
/// both accepted; the identity segment must match `gate_id` exactly.
pub fn parse(
    topic: &str,
    payload: &str,
    prefix: &str,
    gate_id: &str,
) -> Result<GateCommand, CommandError> {
    let rest = topic.strip_prefix(prefix).unwrap_or(topic);
    let (verb, id) = rest.split_once('/').ok_or(CommandError::ForeignTopic)?;
    if id != gate_id {
        return Err(CommandError::ForeignTopic);
    }
    let verb = Verb::from_segment(verb).ok_or(CommandError::UnknownVerb)?;

    match verb {
        Verb::GateCmd => {
            if payload.is_empty() {
                return Err(CommandError::EmptyPayload);
            }
            Target::from_payload(payload)
                .map(GateCommand::Move)
                .ok_or(CommandError::UnknownTarget)
        }
        Verb::SetOpenPos | Verb::GateMax => Ok(GateCommand::SetLimit {
            verb,
            kind: LimitKind::Open,
            value: parse_digits(payload)?,
        }),
        Verb::SetClosePos | Verb::GateMin => Ok(GateCommand::SetLimit {
            verb,
            kind: LimitKind::Closed,
            value: parse_digits(payload)?,
        }),
        Verb::Flash => Ok(GateCommand::Flash),
        Verb::Calibrate => Ok(GateCommand::Calibrate),
    }
}

/// Decimal digits only; no sign, no whitespace.
pub fn parse_digits(payload: &str) -> Result<u16, CommandError> {
    if payload.is_empty() {
        return Err(CommandError::EmptyPayload);
    }
    let mut value: u32 = 0;
    for b in payload.bytes() {
        if !b.is_ascii_digit() {
            return Err(CommandError::NotANumber);
        }
        value = value * 10 + u32::from(b - b'0');
        if value > u32::from(u16::MAX) {
            // Keep scanning so a later non-digit still reports NotANumber.
            return if payload.bytes().all(|c| c.is_ascii_digit()) {
                Err(CommandError::OutOfRange)
            } else {
                Err(CommandError::NotANumber)
            };
        }
    }
    Ok(value as u16)
}

/// `<prefix><verb>/<gate id>`.  Truncated if it would not fit.
pub fn topic_for(prefix: &str, verb: &str, gate_id: &str) -> Topic {
    let mut t = Topic::new();
    let _ = write!(t, "{prefix}{verb}/{gate_id}");
    t
}
