use crate::utils::graph::Box;
use std::cmp::Ordering;

pub mod inference_yolo_seg;

/// A box that survived the confidence filter, before its mask is composed.
#[derive(Debug, Clone, PartialEq)]
pub struct YoloCandidate {
    pub boxed: Box<f32>,
    pub classify: usize,
    pub score: f32,
    pub coefficients: Vec<f32>,
}

pub trait NMSImplement {
    fn non_maximum_suppression(self, iou_threshold: f32) -> Self;
}

impl NMSImplement for Vec<YoloCandidate> {
    /// Class-aware suppression: a box only suppresses boxes of its own class.
    fn non_maximum_suppression(self, iou_threshold: f32) -> Vec<YoloCandidate> {
        let mut candidates = self;
        candidates.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));

        let mut result = Vec::new();

        while !candidates.is_empty() {
            let best = candidates.remove(0);

            candidates.retain(|candidate| {
                candidate.classify != best.classify
                    || best.boxed.iou(&candidate.boxed) <= iou_threshold
            });
            result.push(best);
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(x1: f32, classify: usize, score: f32) -> YoloCandidate {
        YoloCandidate {
            boxed: Box { x1, y1: 0.0, x2: x1 + 10.0, y2: 10.0 },
            classify,
            score,
            coefficients: vec![],
        }
    }

    #[test]
    fn overlapping_boxes_keep_the_best() {
        let kept = vec![
            candidate(0.0, 0, 0.4),
            candidate(1.0, 0, 0.9),
            candidate(50.0, 0, 0.3),
        ]
        .non_maximum_suppression(0.5);

        let scores = kept.iter().map(|c| c.score).collect::<Vec<_>>();
        assert_eq!(scores, vec![0.9, 0.3]);
    }

    #[test]
    fn other_classes_are_not_suppressed() {
        let kept = vec![candidate(0.0, 0, 0.8), candidate(0.0, 1, 0.7)].non_maximum_suppression(0.5);
        assert_eq!(kept.len(), 2);
    }
}
