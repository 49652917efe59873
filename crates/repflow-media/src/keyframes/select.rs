//! Frame selection logic.
//!
//! Pure functions over difference-score series. The extractor feeds these
//! with scores computed from decoded frames; tests feed them synthetic
//! series. Frame indices refer to the decoded sequence at native fps.

/// Tunables for cut detection and selection.
#[derive(Debug, Clone)]
pub struct SelectConfig {
    /// Sliding window (in frames) behind the current frame used for the
    /// adaptive cut threshold.
    pub cut_window: usize,
    /// Declare a cut when score > mean + sigma * stdev over the window.
    pub cut_sigma: f64,
    /// Lower bound on the adaptive threshold; keeps noise in static shots
    /// from registering as cuts.
    pub cut_floor: f64,
    /// Dense sampling rate inside each cut segment.
    pub dense_fps: f64,
    /// Overall floor: no gap between kept frames may exceed 1/min_fps.
    pub min_fps: f64,
    /// Overall ceiling per one-second bucket.
    pub max_fps: f64,
}

impl Default for SelectConfig {
    fn default() -> Self {
        Self {
            cut_window: 48,
            cut_sigma: 3.0,
            cut_floor: 12.0,
            dense_fps: 8.0,
            min_fps: 1.0,
            max_fps: 8.0,
        }
    }
}

/// A frame chosen for export.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SelectedFrame {
    pub frame_idx: usize,
    pub cut_index: u32,
    pub timestamp_ms: u64,
    pub diff_score: f64,
    /// Cut boundaries and the overall first/last frame survive every
    /// pruning pass.
    pub pinned: bool,
}

/// Detect cut frames from the consecutive-frame difference series.
///
/// `scores[i]` is the difference between frame `i` and frame `i - 1`
/// (`scores[0]` must be 0). The threshold adapts to the recent window so
/// busy handheld footage needs a larger spike than a locked-off shot.
pub fn detect_cuts(scores: &[f64], config: &SelectConfig) -> Vec<usize> {
    let mut cuts = Vec::new();
    for i in 1..scores.len() {
        let window_start = i.saturating_sub(config.cut_window);
        let window = &scores[window_start..i];
        let threshold = if window.len() < 4 {
            config.cut_floor
        } else {
            let mean = window.iter().sum::<f64>() / window.len() as f64;
            let variance = window
                .iter()
                .map(|s| (s - mean) * (s - mean))
                .sum::<f64>()
                / window.len() as f64;
            (mean + config.cut_sigma * variance.sqrt()).max(config.cut_floor)
        };
        if scores[i] > threshold {
            cuts.push(i);
        }
    }
    cuts
}

/// Segment boundaries in frame indices: first frame, every cut, last frame.
pub fn segment_boundaries(cuts: &[usize], frame_count: usize) -> Vec<usize> {
    let mut boundaries = Vec::with_capacity(cuts.len() + 2);
    boundaries.push(0);
    for &cut in cuts {
        if cut > 0 && cut < frame_count - 1 {
            boundaries.push(cut);
        }
    }
    boundaries.push(frame_count.saturating_sub(1));
    boundaries.dedup();
    boundaries
}

/// Dense-sample each segment at `dense_fps`, mapping timestamps to the
/// nearest decoded frame. Returns `(frame_idx, cut_index)` pairs in order.
pub fn dense_sample(
    boundaries: &[usize],
    fps: f64,
    config: &SelectConfig,
) -> Vec<(usize, u32)> {
    let step = 1.0 / config.dense_fps;
    let mut sampled: Vec<(usize, u32)> = Vec::new();

    for (seg, pair) in boundaries.windows(2).enumerate() {
        let (start, end) = (pair[0], pair[1]);
        let start_ts = start as f64 / fps;
        let end_ts = end as f64 / fps;
        let cut_index = seg as u32 + 1;

        let mut ts = start_ts;
        while ts <= end_ts + 1e-9 {
            let idx = ((ts * fps).round() as usize).min(end);
            if sampled.last().map(|(i, _)| *i) != Some(idx) {
                sampled.push((idx, cut_index));
            }
            ts += step;
        }
        // The segment end frame is a boundary of the next segment too; keep
        // one copy attributed to the current segment.
        if sampled.last().map(|(i, _)| *i) != Some(end) {
            sampled.push((end, cut_index));
        }
    }
    sampled
}

/// Change-significance pruning inside each segment.
///
/// For each dense frame, its score is the difference against the previously
/// *kept* frame of the same segment; frames beating the per-segment mean
/// survive. Boundary frames (segment starts/ends) are pinned.
pub fn prune_by_change<F>(
    dense: &[(usize, u32)],
    boundaries: &[usize],
    fps: f64,
    diff: F,
) -> Vec<SelectedFrame>
where
    F: Fn(usize, usize) -> f64,
{
    let boundary_set: std::collections::HashSet<usize> = boundaries.iter().copied().collect();
    let mut kept: Vec<SelectedFrame> = Vec::new();

    // Group dense frames per cut segment.
    let mut seg_start = 0usize;
    while seg_start < dense.len() {
        let cut_index = dense[seg_start].1;
        let seg_end = dense[seg_start..]
            .iter()
            .position(|(_, c)| *c != cut_index)
            .map(|off| seg_start + off)
            .unwrap_or(dense.len());
        let segment = &dense[seg_start..seg_end];

        // Per-segment threshold: mean consecutive difference.
        let consecutive: Vec<f64> = segment
            .windows(2)
            .map(|w| diff(w[0].0, w[1].0))
            .collect();
        let threshold = if consecutive.is_empty() {
            0.0
        } else {
            consecutive.iter().sum::<f64>() / consecutive.len() as f64
        };

        let mut last_kept: Option<usize> = None;
        for &(idx, cut) in segment {
            let pinned = boundary_set.contains(&idx);
            let score = match last_kept {
                None => 0.0,
                Some(prev) => diff(prev, idx),
            };
            let keep = pinned || last_kept.is_none() || score > threshold;
            if keep {
                kept.push(SelectedFrame {
                    frame_idx: idx,
                    cut_index: cut,
                    timestamp_ms: frame_ts_ms(idx, fps),
                    diff_score: score,
                    pinned,
                });
                last_kept = Some(idx);
            }
        }
        seg_start = seg_end;
    }
    kept
}

/// Enforce the 1 fps floor and 8 fps ceiling across the whole video.
pub fn enforce_rate_bounds(
    mut kept: Vec<SelectedFrame>,
    dense: &[(usize, u32)],
    fps: f64,
    config: &SelectConfig,
) -> Vec<SelectedFrame> {
    kept.sort_by_key(|f| f.frame_idx);
    kept.dedup_by_key(|f| f.frame_idx);

    // Floor: any gap wider than 1/min_fps gets evenly placed reintroductions
    // pulled from the dense pool.
    let max_gap_ms = (1000.0 / config.min_fps) as u64;
    let mut filled: Vec<SelectedFrame> = Vec::with_capacity(kept.len());
    for i in 0..kept.len() {
        if let Some(prev) = filled.last().copied() {
            let gap = kept[i].timestamp_ms.saturating_sub(prev.timestamp_ms);
            if gap > max_gap_ms {
                let missing = (gap / max_gap_ms) as usize;
                for step in 1..=missing {
                    let target_ms =
                        prev.timestamp_ms + gap * step as u64 / (missing as u64 + 1);
                    if let Some(&(idx, cut)) = dense
                        .iter()
                        .filter(|(idx, _)| {
                            let ts = frame_ts_ms(*idx, fps);
                            ts > prev.timestamp_ms && ts < kept[i].timestamp_ms
                        })
                        .min_by_key(|(idx, _)| {
                            frame_ts_ms(*idx, fps).abs_diff(target_ms)
                        })
                    {
                        if filled.iter().all(|f| f.frame_idx != idx) {
                            filled.push(SelectedFrame {
                                frame_idx: idx,
                                cut_index: cut,
                                timestamp_ms: frame_ts_ms(idx, fps),
                                diff_score: 0.0,
                                pinned: false,
                            });
                        }
                    }
                }
            }
        }
        filled.push(kept[i]);
    }
    filled.sort_by_key(|f| f.frame_idx);
    filled.dedup_by_key(|f| f.frame_idx);

    // Ceiling: within each one-second bucket, drop lowest-score frames
    // first until at most max_fps remain. Pinned frames are never dropped.
    let max_per_second = config.max_fps as usize;
    let mut by_second: std::collections::BTreeMap<u64, Vec<SelectedFrame>> =
        std::collections::BTreeMap::new();
    for frame in filled {
        by_second
            .entry(frame.timestamp_ms / 1000)
            .or_default()
            .push(frame);
    }

    let mut bounded = Vec::new();
    for (_, mut frames) in by_second {
        if frames.len() > max_per_second {
            frames.sort_by(|a, b| {
                b.pinned.cmp(&a.pinned).then(
                    b.diff_score
                        .partial_cmp(&a.diff_score)
                        .unwrap_or(std::cmp::Ordering::Equal),
                )
            });
            let pinned_count = frames.iter().filter(|f| f.pinned).count();
            frames.truncate(max_per_second.max(pinned_count));
        }
        bounded.extend(frames);
    }
    bounded.sort_by_key(|f| f.frame_idx);
    bounded
}

pub fn frame_ts_ms(frame_idx: usize, fps: f64) -> u64 {
    ((frame_idx as f64 / fps) * 1000.0).round() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> SelectConfig {
        SelectConfig::default()
    }

    #[test]
    fn detect_cuts_flags_spikes_over_quiet_baseline() {
        // 2.0 baseline noise with one hard cut at index 60.
        let mut scores = vec![2.0; 120];
        scores[0] = 0.0;
        scores[60] = 80.0;
        let cuts = detect_cuts(&scores, &config());
        assert_eq!(cuts, vec![60]);
    }

    #[test]
    fn detect_cuts_adapts_to_busy_footage() {
        // Noisy handheld footage around 10.0; a 14.0 wobble is not a cut.
        let mut scores: Vec<f64> = (0..200)
            .map(|i| 10.0 + ((i % 7) as f64) * 0.5)
            .collect();
        scores[0] = 0.0;
        scores[100] = 14.0;
        let cuts = detect_cuts(&scores, &config());
        assert!(cuts.is_empty());
    }

    #[test]
    fn boundaries_always_include_first_and_last() {
        assert_eq!(segment_boundaries(&[], 300), vec![0, 299]);
        assert_eq!(segment_boundaries(&[100], 300), vec![0, 100, 299]);
        // Cuts at the edges collapse into the existing boundaries.
        assert_eq!(segment_boundaries(&[0, 299], 300), vec![0, 299]);
    }

    #[test]
    fn dense_sample_runs_at_eight_fps() {
        // 10 s at 30 fps, no cuts: 8 fps sampling = 81 frames inclusive.
        let boundaries = segment_boundaries(&[], 300);
        let dense = dense_sample(&boundaries, 30.0, &config());
        assert!(dense.len() >= 80 && dense.len() <= 82, "got {}", dense.len());
        assert_eq!(dense.first().unwrap().0, 0);
        assert_eq!(dense.last().unwrap().0, 299);
    }

    #[test]
    fn prune_keeps_changing_frames_and_pins_boundaries() {
        let boundaries = segment_boundaries(&[], 300);
        let dense = dense_sample(&boundaries, 30.0, &config());
        // Difference proportional to frame distance: every frame clears the
        // mean-of-consecutive threshold, so pruning keeps motion frames.
        let kept = prune_by_change(&dense, &boundaries, 30.0, |a, b| {
            (b as f64 - a as f64).abs()
        });
        assert!(kept.first().unwrap().pinned);
        assert!(kept.last().unwrap().pinned);
        assert!(kept.len() > 2);
    }

    #[test]
    fn prune_collapses_static_segments() {
        let boundaries = segment_boundaries(&[], 300);
        let dense = dense_sample(&boundaries, 30.0, &config());
        // A frozen frame: zero difference everywhere.
        let kept = prune_by_change(&dense, &boundaries, 30.0, |_, _| 0.0);
        // Only pinned boundaries and the initial frame of the walk survive.
        assert!(kept.len() <= 3);
    }

    #[test]
    fn rate_floor_reintroduces_frames_into_wide_gaps() {
        let boundaries = segment_boundaries(&[], 300);
        let dense = dense_sample(&boundaries, 30.0, &config());
        // Static video: pruning left only the two endpoints of 10 s.
        let kept = prune_by_change(&dense, &boundaries, 30.0, |_, _| 0.0);
        let bounded = enforce_rate_bounds(kept, &dense, 30.0, &config());
        // 10 s with a 1 fps floor needs at least ~10 frames.
        assert!(bounded.len() >= 9, "got {}", bounded.len());
        for pair in bounded.windows(2) {
            assert!(pair[1].timestamp_ms - pair[0].timestamp_ms <= 1000 + 150);
        }
    }

    #[test]
    fn rate_ceiling_caps_frames_per_second() {
        let boundaries = segment_boundaries(&[], 300);
        let dense = dense_sample(&boundaries, 30.0, &config());
        let kept = prune_by_change(&dense, &boundaries, 30.0, |a, b| {
            (b as f64 - a as f64).abs()
        });
        let bounded = enforce_rate_bounds(kept, &dense, 30.0, &config());
        let mut per_second = std::collections::HashMap::new();
        for frame in &bounded {
            *per_second.entry(frame.timestamp_ms / 1000).or_insert(0usize) += 1;
        }
        assert!(per_second.values().all(|&c| c <= 8), "{:?}", per_second);
    }
}
