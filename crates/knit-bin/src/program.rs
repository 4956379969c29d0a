//! JSON wire format for traced programs.
//!
//! The tracing front end hands over a sequence of time-indexed beds; this
//! module deserializes that document and converts it into the core model.
//! Needles are written `f<index>` / `b<index>`; stitch ids are plain
//! integers. Unknown pass kinds are logged and skipped, malformed needles
//! are hard errors.

use anyhow::Result;
use core_bed::{
    Action, ActionKind, CompileError, Increase, IncreaseKind, Needle, Pairing, Pass, PassKind,
    StitchId, TimeBed,
};
use core_code::Side;
use serde::Deserialize;
use std::collections::HashMap;
use tracing::warn;

#[derive(Debug, Deserialize)]
pub struct ProgramDoc {
    pub beds: Vec<BedDoc>,
}

#[derive(Debug, Deserialize)]
pub struct BedDoc {
    #[serde(default)]
    pub time: Option<usize>,
    #[serde(default)]
    pub group: usize,
    pub width: usize,
    #[serde(default)]
    pub circular: bool,
    #[serde(default)]
    pub shortrow: bool,
    #[serde(default)]
    pub expansion: u8,
    #[serde(default)]
    pub states: StatesDoc,
    /// stitch id -> needle ("f3" / "b12")
    #[serde(default)]
    pub needles: HashMap<String, String>,
    pub passes: Vec<PassDoc>,
}

#[derive(Debug, Deserialize, Default)]
pub struct StatesDoc {
    #[serde(default)]
    pub front: Vec<usize>,
    #[serde(default)]
    pub back: Vec<usize>,
}

#[derive(Debug, Deserialize)]
pub struct PassDoc {
    pub kind: String,
    #[serde(default)]
    pub sequence: Vec<u32>,
    #[serde(default)]
    pub actions: HashMap<String, ActionDoc>,
    #[serde(default)]
    pub yarn_starts: bool,
    #[serde(default)]
    pub yarn_ends: bool,
    #[serde(default = "default_true")]
    pub safe_cast: bool,
    #[serde(default)]
    pub tag: Option<String>,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
pub struct ActionDoc {
    #[serde(default)]
    pub kind: Option<String>,
    pub source: String,
    #[serde(default)]
    pub targets: Vec<String>,
    #[serde(default)]
    pub reverse: bool,
    #[serde(default)]
    pub casting: bool,
    #[serde(default)]
    pub pairing: Option<PairingDoc>,
    #[serde(default)]
    pub restack: bool,
    #[serde(default)]
    pub increase: Option<IncreaseDoc>,
}

#[derive(Debug, Deserialize)]
pub struct PairingDoc {
    pub partner: u32,
    #[serde(default)]
    pub above: bool,
}

#[derive(Debug, Deserialize)]
pub struct IncreaseDoc {
    pub kind: String,
    pub target: String,
}

pub fn parse_needle(s: &str) -> Result<Needle, CompileError> {
    let malformed = || CompileError::MalformedProgram { reason: format!("bad needle '{s}'") };
    let (side, rest) = s.split_at_checked(1).ok_or_else(malformed)?;
    let index: usize = rest.parse().map_err(|_| malformed())?;
    match side {
        "f" => Ok(Needle { index, side: Side::Front }),
        "b" => Ok(Needle { index, side: Side::Back }),
        _ => Err(malformed()),
    }
}

fn parse_action(doc: &ActionDoc) -> Result<Action, CompileError> {
    let kind = match doc.kind.as_deref() {
        None | Some("none") => ActionKind::None,
        Some("knit") => ActionKind::Knit,
        Some("tuck") => ActionKind::Tuck,
        Some("miss") => ActionKind::Miss,
        Some("split") => ActionKind::Split,
        Some("fb_knit") => ActionKind::FbKnit,
        Some("kickback") => ActionKind::Kickback,
        Some("split_miss") => ActionKind::SplitMiss,
        Some(other) => {
            warn!(kind = other, "unknown action kind; treated as none");
            ActionKind::None
        },
    };
    let mut action = Action::new(kind, parse_needle(&doc.source)?);
    for t in &doc.targets {
        action.targets.push(parse_needle(t)?);
    }
    action.reverse = doc.reverse;
    action.casting = doc.casting;
    action.restack = doc.restack;
    action.pairing = doc
        .pairing
        .as_ref()
        .map(|p| Pairing { partner: StitchId(p.partner), above: p.above });
    action.increase = match &doc.increase {
        None => None,
        Some(inc) => {
            let kind = match inc.kind.as_str() {
                "kickback" => IncreaseKind::Kickback,
                _ => IncreaseKind::Split,
            };
            Some(Increase { kind, target: parse_needle(&inc.target)? })
        },
    };
    Ok(action)
}

/// Convert the document into the core model. Returns the beds in time
/// order.
pub fn into_beds(doc: ProgramDoc) -> Result<Vec<TimeBed>, CompileError> {
    let mut beds = Vec::with_capacity(doc.beds.len());
    for (i, bed_doc) in doc.beds.into_iter().enumerate() {
        let mut bed = TimeBed::new(bed_doc.time.unwrap_or(i), bed_doc.width);
        bed.group = bed_doc.group;
        bed.circular = bed_doc.circular;
        bed.shortrow = bed_doc.shortrow;
        bed.expansion = bed_doc.expansion;
        for idx in bed_doc.states.front {
            bed.states.set(Side::Front, idx, true);
        }
        for idx in bed_doc.states.back {
            bed.states.set(Side::Back, idx, true);
        }
        for (stitch, needle) in &bed_doc.needles {
            let id: u32 = stitch.parse().map_err(|_| CompileError::MalformedProgram {
                reason: format!("bad stitch id '{stitch}'"),
            })?;
            bed.assign(StitchId(id), parse_needle(needle)?);
        }
        for pass_doc in bed_doc.passes {
            let kind = match pass_doc.kind.as_str() {
                "cast_on" => PassKind::CastOn,
                "cast_off" => PassKind::CastOff,
                "actions" => PassKind::Actions,
                "transfers" => PassKind::Transfers,
                other => {
                    warn!(kind = other, "unknown pass kind; skipped");
                    continue;
                },
            };
            let mut pass = Pass::new(kind);
            pass.sequence = pass_doc.sequence.iter().map(|s| StitchId(*s)).collect();
            pass.yarn_starts = pass_doc.yarn_starts;
            pass.yarn_ends = pass_doc.yarn_ends;
            pass.safe_cast = pass_doc.safe_cast;
            pass.tag = pass_doc.tag;
            for (stitch, action_doc) in &pass_doc.actions {
                let id: u32 = stitch.parse().map_err(|_| CompileError::MalformedProgram {
                    reason: format!("bad stitch id '{stitch}'"),
                })?;
                pass.actions.insert(StitchId(id), parse_action(action_doc)?);
            }
            bed.passes.push(pass);
        }
        beds.push(bed);
    }
    beds.sort_by_key(|b| b.time);
    Ok(beds)
}

pub fn load(path: &std::path::Path) -> Result<Vec<TimeBed>> {
    let raw = std::fs::read_to_string(path)?;
    let doc: ProgramDoc = serde_json::from_str(&raw)?;
    Ok(into_beds(doc)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn needle_parsing() {
        assert_eq!(parse_needle("f3").unwrap(), Needle::front(3));
        assert_eq!(parse_needle("b12").unwrap(), Needle::back(12));
        assert!(parse_needle("x3").is_err());
        assert!(parse_needle("f").is_err());
        assert!(parse_needle("").is_err());
    }

    #[test]
    fn load_reads_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("p.json");
        std::fs::write(&path, r#"{"beds":[{"width":2,"passes":[]}]}"#).unwrap();
        let beds = load(&path).unwrap();
        assert_eq!(beds[0].width, 2);
    }

    #[test]
    fn program_round_trip() {
        let doc: ProgramDoc = serde_json::from_str(
            r#"{
                "beds": [{
                    "width": 4,
                    "needles": { "0": "f0", "1": "f1" },
                    "states": { "front": [0, 1] },
                    "passes": [
                        { "kind": "actions", "sequence": [0, 1],
                          "actions": {
                            "0": { "kind": "knit", "source": "f0" },
                            "1": { "kind": "knit", "source": "f1", "reverse": true }
                          } },
                        { "kind": "mystery", "sequence": [] }
                    ]
                }]
            }"#,
        )
        .unwrap();
        let beds = into_beds(doc).unwrap();
        assert_eq!(beds.len(), 1);
        // The mystery pass was skipped.
        assert_eq!(beds[0].passes.len(), 1);
        let pass = &beds[0].passes[0];
        assert_eq!(pass.kind, PassKind::Actions);
        assert!(pass.action_of(StitchId(1)).unwrap().reverse);
        assert_eq!(beds[0].needle_of(StitchId(0)), Some(Needle::front(0)));
    }
}
