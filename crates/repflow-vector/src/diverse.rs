//! Diverse candidate selection.
//!
//! Story retrieval over-fetches similarity hits, buckets them into movement
//! families via a fixed keyword map over `name` + `how_to`, then greedily
//! picks in descending score while capping each family. This keeps a routine
//! from being assembled out of five near-identical stretches.

use repflow_core::VectorHit;

/// Movement families, in fixed match order: the first family whose keyword
/// appears wins, so more specific families come first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MovementCategory {
    Handstand,
    Stretch,
    Core,
    Push,
    HipLeg,
    Balance,
    Wall,
    Floor,
    Other,
}

impl MovementCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            MovementCategory::Handstand => "handstand",
            MovementCategory::Stretch => "stretch",
            MovementCategory::Core => "core",
            MovementCategory::Push => "push",
            MovementCategory::HipLeg => "hip_leg",
            MovementCategory::Balance => "balance",
            MovementCategory::Wall => "wall",
            MovementCategory::Floor => "floor",
            MovementCategory::Other => "other",
        }
    }
}

const CATEGORY_KEYWORDS: &[(MovementCategory, &[&str])] = &[
    (MovementCategory::Handstand, &["handstand", "hand stand"]),
    (
        MovementCategory::Stretch,
        &["stretch", "mobility", "flexibility"],
    ),
    (
        MovementCategory::Core,
        &["core", "abs", "plank", "hollow", "crunch"],
    ),
    (MovementCategory::Push, &["push", "press", "dip"]),
    (
        MovementCategory::HipLeg,
        &["hip", "leg", "squat", "lunge", "glute", "hamstring"],
    ),
    (
        MovementCategory::Balance,
        &["balance", "stability", "single leg"],
    ),
    (MovementCategory::Wall, &["wall"]),
    (MovementCategory::Floor, &["floor", "ground", "lying"]),
];

/// Bucket a hit into its movement family from `name` + `how_to`.
pub fn categorize(hit: &VectorHit) -> MovementCategory {
    let mut text = hit.payload.name.to_lowercase();
    if let Some(how_to) = &hit.payload.how_to {
        text.push(' ');
        text.push_str(&how_to.to_lowercase());
    }
    for (category, keywords) in CATEGORY_KEYWORDS {
        if keywords.iter().any(|kw| text.contains(kw)) {
            return *category;
        }
    }
    MovementCategory::Other
}

/// Greedy category-capped selection: walk hits in descending score, skip any
/// whose family already holds `max_per_category` picks, stop at `k_final` or
/// when the buffer is exhausted.
pub fn diverse_select(
    mut hits: Vec<VectorHit>,
    k_final: usize,
    max_per_category: usize,
) -> Vec<VectorHit> {
    hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));

    let mut counts: std::collections::HashMap<MovementCategory, usize> =
        std::collections::HashMap::new();
    let mut selected = Vec::with_capacity(k_final);

    for hit in hits {
        if selected.len() >= k_final {
            break;
        }
        let category = categorize(&hit);
        let count = counts.entry(category).or_insert(0);
        if *count >= max_per_category {
            continue;
        }
        *count += 1;
        selected.push(hit);
    }
    selected
}
