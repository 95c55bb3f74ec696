//! Shake gesture detection over pointer deltas.
//!
//! While an object is held, pointer deltas stream into two ring buffers.
//! A direction change counts when a delta exceeds the threshold and its
//! sign differs from the previous sample; enough changes inside the buffer
//! window register a shake, which splits the held group.

use std::collections::VecDeque;

use bevy::prelude::*;

#[derive(Debug, Resource)]
pub struct ShakeDetector {
    max_samples: usize,
    max_direction_changes: u32,
    threshold: f32,
    deltas_x: VecDeque<f32>,
    deltas_y: VecDeque<f32>,
}

impl Default for ShakeDetector {
    fn default() -> Self {
        Self::new(50, 6, 0.1)
    }
}

impl ShakeDetector {
    pub fn new(max_samples: usize, max_direction_changes: u32, threshold: f32) -> Self {
        Self {
            max_samples,
            max_direction_changes,
            threshold,
            deltas_x: VecDeque::new(),
            deltas_y: VecDeque::new(),
        }
    }

    /// Feed one frame of pointer movement. Returns true when a shake is
    /// registered; the sample buffers are cleared on detection.
    pub fn push(&mut self, dx: f32, dy: f32) -> bool {
        self.deltas_x.push_back(dx);
        if self.deltas_x.len() > self.max_samples {
            self.deltas_x.pop_front();
        }
        self.deltas_y.push_back(dy);
        if self.deltas_y.len() > self.max_samples {
            self.deltas_y.pop_front();
        }

        let changes =
            count_direction_changes(&self.deltas_x, self.threshold)
                + count_direction_changes(&self.deltas_y, self.threshold);

        if changes >= self.max_direction_changes {
            self.reset();
            true
        } else {
            false
        }
    }

    /// Drop all buffered samples, e.g. when the held object changes.
    pub fn reset(&mut self) {
        self.deltas_x.clear();
        self.deltas_y.clear();
    }
}

fn count_direction_changes(deltas: &VecDeque<f32>, threshold: f32) -> u32 {
    let mut changes = 0;
    for i in 1..deltas.len() {
        let current = deltas[i];
        let previous = deltas[i - 1];
        if current.abs() > threshold && sign(current) != sign(previous) {
            changes += 1;
        }
    }
    changes
}

fn sign(value: f32) -> i8 {
    if value > 0.0 {
        1
    } else if value < 0.0 {
        -1
    } else {
        0
    }
}
