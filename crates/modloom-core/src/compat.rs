//! Platform compatibility resolution.
//!
//! A [`CompatibilityGraph`] records, for each target, the targets whose
//! builds it can consume, most preferred first. [`PlatformCompatibility`]
//! flattens the graph once for the host target into a most-specific-first
//! list and uses the position in that list to rank package builds.
//!
//! The flattening prefers the host's own framework family: every target
//! reachable without leaving the family ranks ahead of any target in
//! another family, so a `net8.0` host takes a `netcoreapp2.1` build over a
//! `netstandard2.1` one. Once the walk enters a family it finishes that
//! family before the next entry point.

use modloom_schema::{CompatibilityEdge, PlatformTarget};
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet};

/// Directed fallback graph between platform targets.
#[derive(Debug, Clone, Default)]
pub struct CompatibilityGraph {
    edges: HashMap<PlatformTarget, Vec<PlatformTarget>>,
}

impl CompatibilityGraph {
    /// An empty graph: every target is compatible only with itself and `any`.
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in graph covering the common runtime framework monikers.
    pub fn builtin() -> Self {
        let mut graph = Self::new();

        // Modern runtimes step down one major at a time, then into netcoreapp.
        for major in 6..=10 {
            graph.add(&format!("net{major}.0"), &[format!("net{}.0", major - 1).as_str()]);
        }
        graph.add("net5.0", &["netcoreapp3.1"]);

        graph.add("netcoreapp3.1", &["netcoreapp3.0"]);
        graph.add("netcoreapp3.0", &["netcoreapp2.2", "netstandard2.1"]);
        graph.add("netcoreapp2.2", &["netcoreapp2.1"]);
        graph.add("netcoreapp2.1", &["netcoreapp2.0"]);
        graph.add("netcoreapp2.0", &["netcoreapp1.1", "netstandard2.0"]);
        graph.add("netcoreapp1.1", &["netcoreapp1.0"]);
        graph.add("netcoreapp1.0", &["netstandard1.6"]);

        graph.add("netstandard2.1", &["netstandard2.0"]);
        graph.add("netstandard2.0", &["netstandard1.6"]);
        for minor in 1..=6 {
            graph.add(
                &format!("netstandard1.{minor}"),
                &[format!("netstandard1.{}", minor - 1).as_str()],
            );
        }
        graph.add("netstandard1.0", &[PlatformTarget::ANY]);

        graph.add("net481", &["net48"]);
        graph.add("net48", &["net472"]);
        graph.add("net472", &["net471"]);
        graph.add("net471", &["net47"]);
        graph.add("net47", &["net462"]);
        graph.add("net462", &["net461"]);
        graph.add("net461", &["net46", "netstandard2.0"]);
        graph.add("net46", &["net452", "netstandard1.3"]);
        graph.add("net452", &["net451"]);
        graph.add("net451", &["net45", "netstandard1.2"]);
        graph.add("net45", &["netstandard1.1"]);

        graph
    }

    /// Add fallbacks for `target`, appended after any it already has.
    pub fn with_edge(
        mut self,
        target: PlatformTarget,
        falls_back_to: Vec<PlatformTarget>,
    ) -> Self {
        self.extend_edge(target, falls_back_to);
        self
    }

    /// Layer configured edges onto the graph.
    pub fn with_edges(mut self, edges: &[CompatibilityEdge]) -> Self {
        for edge in edges {
            self.extend_edge(edge.target.clone(), edge.falls_back_to.clone());
        }
        self
    }

    /// Direct fallbacks of `target`.
    pub fn fallbacks(&self, target: &PlatformTarget) -> &[PlatformTarget] {
        self.edges.get(target).map_or(&[], Vec::as_slice)
    }

    fn extend_edge(&mut self, target: PlatformTarget, falls_back_to: Vec<PlatformTarget>) {
        let entry = self.edges.entry(target).or_default();
        for fallback in falls_back_to {
            if !entry.contains(&fallback) {
                entry.push(fallback);
            }
        }
    }

    // Built-in monikers are literals known to be valid.
    fn add(&mut self, target: &str, falls_back_to: &[&str]) {
        let Ok(target) = PlatformTarget::new(target) else {
            return;
        };
        let fallbacks = falls_back_to
            .iter()
            .filter_map(|t| PlatformTarget::new(t).ok())
            .collect();
        self.extend_edge(target, fallbacks);
    }
}

/// Framework family of a moniker: the name with its version stripped.
///
/// Dotted `net5.0`+ monikers continue the `netcoreapp` line; dotless
/// `net4x` monikers are the desktop framework.
fn family(target: &PlatformTarget) -> &str {
    let moniker = target.as_str();
    let name = moniker.trim_end_matches(|c: char| c.is_ascii_digit() || c == '.');
    match name {
        "net" if moniker.contains('.') => "netcoreapp",
        "net" => "netfx",
        name => name,
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
struct Distance {
    switches: usize,
    before: usize,
    within: usize,
}

impl Distance {
    fn step(self, same_family: bool) -> Self {
        if same_family {
            Self {
                within: self.within + 1,
                ..self
            }
        } else {
            Self {
                switches: self.switches + 1,
                before: self.before + self.within + 1,
                within: 0,
            }
        }
    }
}

/// The host's view of target compatibility, computed once per session.
#[derive(Debug, Clone)]
pub struct PlatformCompatibility {
    host: PlatformTarget,
    ordered: Vec<PlatformTarget>,
    rank: HashMap<PlatformTarget, usize>,
}

impl PlatformCompatibility {
    /// Flatten `graph` from `host`, nearest first.
    ///
    /// Distance counts family changes first, then the hops taken before
    /// entering the current family, then the hops within it. Targets at the
    /// same distance keep edge order. `any` is always compatible and always
    /// ranks last.
    pub fn new(host: PlatformTarget, graph: &CompatibilityGraph) -> Self {
        let any = PlatformTarget::any();
        let mut ordered = Vec::new();
        let mut seen = HashSet::new();
        let mut queue = BinaryHeap::from([Reverse((Distance::default(), 0_usize, host.clone()))]);
        let mut discovered = 1;

        while let Some(Reverse((distance, _, target))) = queue.pop() {
            if target == any || !seen.insert(target.clone()) {
                continue;
            }
            for next in graph.fallbacks(&target) {
                if seen.contains(next) {
                    continue;
                }
                let step = distance.step(family(&target) == family(next));
                queue.push(Reverse((step, discovered, next.clone())));
                discovered += 1;
            }
            ordered.push(target);
        }
        ordered.push(any);

        let rank = ordered
            .iter()
            .enumerate()
            .map(|(i, t)| (t.clone(), i))
            .collect();

        tracing::debug!(host = %host, compatible = ordered.len(), "computed platform compatibility");

        Self {
            host,
            ordered,
            rank,
        }
    }

    /// Compatibility for the detected host over the built-in graph.
    pub fn detect() -> Self {
        Self::new(PlatformTarget::detect_host(), &CompatibilityGraph::builtin())
    }

    /// The host target.
    pub fn host(&self) -> &PlatformTarget {
        &self.host
    }

    /// Compatible targets, most specific first.
    pub fn compatible_targets(&self) -> &[PlatformTarget] {
        &self.ordered
    }

    /// Whether builds for `target` can run on the host.
    pub fn is_compatible(&self, target: &PlatformTarget) -> bool {
        self.rank.contains_key(target)
    }

    /// Position of `target` in the specificity order, `None` if incompatible.
    pub fn rank(&self, target: &PlatformTarget) -> Option<usize> {
        self.rank.get(target).copied()
    }

    /// Pick the candidate whose target is compatible and most specific.
    ///
    /// Candidates sharing the best rank are resolved by input order: the
    /// first one wins. Returns `None` when nothing is compatible.
    pub fn nearest_compatible<T, F>(
        &self,
        candidates: impl IntoIterator<Item = T>,
        selector: F,
    ) -> Option<T>
    where
        F: Fn(&T) -> &PlatformTarget,
    {
        let mut best: Option<(usize, T)> = None;
        for candidate in candidates {
            let Some(rank) = self.rank(selector(&candidate)) else {
                continue;
            };
            if best.as_ref().is_none_or(|(best_rank, _)| rank < *best_rank) {
                best = Some((rank, candidate));
            }
        }
        best.map(|(_, candidate)| candidate)
    }
}
