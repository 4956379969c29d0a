//! JSON wire format for skeletons, used by the `schedule` subcommand.

use anyhow::{Result, anyhow};
use core_shape::{
    Custom, Joint, NodeId, NodeKind, Path, Sheet, Sidedness, Skeleton, Split, WidthProfile,
};
use serde::Deserialize;
use std::collections::HashMap;

#[derive(Debug, Deserialize)]
pub struct SkeletonDoc {
    pub nodes: Vec<NodeDoc>,
    /// Pairs of "node/path" endpoints, e.g. ["body/top", "split/base"].
    #[serde(default)]
    pub connections: Vec<(String, String)>,
    /// Dangling ends sewn closed, e.g. ["hat/top"].
    #[serde(default)]
    pub closed: Vec<String>,
    /// Start position, defaulting to the first node's lower path.
    #[serde(default)]
    pub start: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct NodeDoc {
    pub name: String,
    pub kind: String,
    #[serde(default)]
    pub width: Option<WidthDoc>,
    #[serde(default)]
    pub sides: Option<String>,
    #[serde(default)]
    pub courses: Option<usize>,
    #[serde(default)]
    pub shortrows: bool,
    #[serde(default)]
    pub degree: Option<usize>,
    #[serde(default)]
    pub folded: bool,
    // Custom-shape metadata, precomputed by the DSL layer.
    #[serde(default)]
    pub first_two_sided: bool,
    #[serde(default)]
    pub last_two_sided: bool,
    #[serde(default)]
    pub bottom_size: Option<usize>,
    #[serde(default)]
    pub top_size: Option<usize>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum WidthDoc {
    Constant(usize),
    Linear { bottom: usize, top: usize },
}

impl WidthDoc {
    fn profile(&self) -> WidthProfile {
        match self {
            WidthDoc::Constant(w) => WidthProfile::Constant(*w),
            WidthDoc::Linear { bottom, top } => {
                WidthProfile::Linear { bottom: *bottom, top: *top }
            },
        }
    }
}

pub fn parse_path(s: &str) -> Result<Path> {
    match s {
        "bottom" => Ok(Path::Bottom),
        "top" => Ok(Path::Top),
        "base" => Ok(Path::Base),
        _ => s
            .strip_prefix("branches/")
            .and_then(|n| n.parse().ok())
            .map(Path::Branch)
            .ok_or_else(|| anyhow!("bad path '{s}'")),
    }
}

fn split_endpoint(s: &str) -> Result<(&str, Path)> {
    let (node, path) = s
        .split_once('/')
        .map(|(n, p)| (n, p))
        .ok_or_else(|| anyhow!("bad endpoint '{s}': expected node/path"))?;
    // Branch paths carry their own slash.
    if let Some(rest) = path.strip_prefix("branches") {
        let n: usize = rest
            .strip_prefix('/')
            .and_then(|r| r.parse().ok())
            .ok_or_else(|| anyhow!("bad branch endpoint '{s}'"))?;
        return Ok((node, Path::Branch(n)));
    }
    Ok((node, parse_path(path)?))
}

/// Build the arena skeleton plus the chosen start position.
pub fn into_skeleton(doc: SkeletonDoc) -> Result<(Skeleton, NodeId, Path)> {
    let mut skel = Skeleton::new();
    let mut ids: HashMap<String, NodeId> = HashMap::new();
    for node in &doc.nodes {
        let width = node
            .width
            .as_ref()
            .map(WidthDoc::profile)
            .unwrap_or(WidthProfile::Constant(10));
        let courses = node.courses.unwrap_or(4);
        let kind = match node.kind.as_str() {
            "sheet" => NodeKind::Sheet(Sheet {
                width,
                sides: match node.sides.as_deref() {
                    Some("cylinder") => Sidedness::Cylinder,
                    Some("auto") => Sidedness::Auto,
                    _ => Sidedness::Flat,
                },
                courses,
                shortrows: node.shortrows,
            }),
            "joint" => NodeKind::Joint(Joint { width, courses }),
            "split" => NodeKind::Split(Split {
                degree: node.degree.unwrap_or(2),
                folded: node.folded,
            }),
            "custom" => NodeKind::Custom(Custom {
                courses,
                first_two_sided: node.first_two_sided,
                last_two_sided: node.last_two_sided,
                bottom_size: node.bottom_size.unwrap_or(10),
                top_size: node.top_size.unwrap_or(10),
            }),
            other => return Err(anyhow!("unknown node kind '{other}'")),
        };
        let id = skel.add(node.name.clone(), kind);
        ids.insert(node.name.clone(), id);
    }

    let lookup = |name: &str| -> Result<NodeId> {
        ids.get(name).copied().ok_or_else(|| anyhow!("unknown node '{name}'"))
    };
    for (a, b) in &doc.connections {
        let (a_node, a_path) = split_endpoint(a)?;
        let (b_node, b_path) = split_endpoint(b)?;
        skel.connect(lookup(a_node)?, a_path, lookup(b_node)?, b_path);
    }
    for end in &doc.closed {
        let (node, path) = split_endpoint(end)?;
        skel.close(lookup(node)?, path);
    }

    let (start, start_path) = match &doc.start {
        Some(s) => {
            let (node, path) = split_endpoint(s)?;
            (lookup(node)?, path)
        },
        None => {
            let first = doc.nodes.first().ok_or_else(|| anyhow!("empty skeleton"))?;
            let id = lookup(&first.name)?;
            let path = skel.node(id).paths()[0];
            (id, path)
        },
    };
    Ok((skel, start, start_path))
}

pub fn load(path: &std::path::Path) -> Result<(Skeleton, NodeId, Path)> {
    let raw = std::fs::read_to_string(path)?;
    let doc: SkeletonDoc = serde_json::from_str(&raw)?;
    into_skeleton(doc)
}
