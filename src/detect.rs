// Copyright 2025 edgecam-recorder contributors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

// Detection feed contract and trigger qualification

use serde::{Deserialize, Serialize};

/// Synthetic class name for operator-forced recordings.
pub const MANUAL_CLASS: &str = "manual";

/// One classifier hit on the most recent frame. Ephemeral; produced per
/// tick and never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionEvent {
    pub class_name: String,
    /// Confidence in [0, 1].
    pub confidence: f32,
    /// Pixel bounding box (x0, y0, x1, y1).
    pub bbox: (u32, u32, u32, u32),
}

/// Pull source of detection results, invoked once per scheduling tick.
///
/// Implementations wrap the actual inference pipeline; the engine never
/// runs inference itself. The returned sequence is ordered and bounded
/// per tick, and may be empty.
pub trait DetectionFeed: Send {
    fn poll(&mut self) -> Vec<DetectionEvent>;
}

/// Feed that never detects anything. Useful when wiring the engine
/// without a classifier attached.
pub struct StubFeed;

impl DetectionFeed for StubFeed {
    fn poll(&mut self) -> Vec<DetectionEvent> {
        Vec::new()
    }
}

/// Ordered set of class names that trigger a recording.
///
/// Iteration order is the configured order; when several classes qualify
/// in one tick the earliest entry wins, which keeps trigger attribution
/// deterministic.
#[derive(Debug, Clone)]
pub struct WatchList {
    classes: Vec<String>,
}

impl WatchList {
    pub fn new(classes: Vec<String>) -> Self {
        Self { classes }
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn contains(&self, class_name: &str) -> bool {
        self.classes.iter().any(|c| c == class_name)
    }

    /// Pick the winning qualifying detection for this tick, if any.
    ///
    /// A detection qualifies when `confidence > threshold`,
    /// `confidence < 1.0` (exact 1.0 readings are classifier glitches),
    /// and its class is watched. Ties break on watch-list position, then
    /// feed order.
    pub fn qualify<'a>(
        &self,
        detections: &'a [DetectionEvent],
        threshold: f32,
    ) -> Option<&'a DetectionEvent> {
        for class in &self.classes {
            if let Some(event) = detections.iter().find(|d| {
                d.class_name == *class && d.confidence > threshold && d.confidence < 1.0
            }) {
                return Some(event);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(class: &str, confidence: f32) -> DetectionEvent {
        DetectionEvent {
            class_name: class.to_string(),
            confidence,
            bbox: (0, 0, 10, 10),
        }
    }

    #[test]
    fn test_qualification_threshold() {
        let list = WatchList::new(vec!["cat".into(), "dog".into()]);

        assert!(list.qualify(&[event("dog", 0.7)], 0.5).is_some());
        assert!(list.qualify(&[event("dog", 0.5)], 0.5).is_none()); // strict
        assert!(list.qualify(&[event("dog", 0.3)], 0.5).is_none());
    }

    #[test]
    fn test_confidence_one_is_rejected() {
        let list = WatchList::new(vec!["cat".into()]);
        assert!(list.qualify(&[event("cat", 1.0)], 0.5).is_none());
        assert!(list.qualify(&[event("cat", 0.999)], 0.5).is_some());
    }

    #[test]
    fn test_unwatched_class_ignored() {
        let list = WatchList::new(vec!["cat".into()]);
        assert!(list.qualify(&[event("bicycle", 0.9)], 0.5).is_none());
    }

    #[test]
    fn test_tie_break_by_watch_list_order() {
        let list = WatchList::new(vec!["cat".into(), "dog".into()]);
        let detections = [event("dog", 0.9), event("cat", 0.6)];

        let winner = list.qualify(&detections, 0.5).unwrap();
        assert_eq!(winner.class_name, "cat");
    }

    #[test]
    fn test_empty_feed() {
        let list = WatchList::new(vec!["cat".into()]);
        assert!(list.qualify(&[], 0.5).is_none());
    }
}
