use std::collections::VecDeque;
use wasm_bindgen::prelude::*;

use crate::config::FpsGraphConfig;

// Rolling window for FPS and frame-time stats
const WINDOW_MS: f64 = 1000.0;

#[wasm_bindgen]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FpsSample {
    pub timestamp: f64,        // Milliseconds since session start
    pub fps: f64,              // Frames in the last second
    pub frame_time_ms: f64,    // Average frame time in window
    pub min_frame_time: f64,   // Min frame time in window
    pub max_frame_time: f64,   // Max frame time in window
    pub frame_count: u32,      // Total frames since start
    pub instance_count: u32,   // Cells drawn in the latest frame
}

/// Frame timing for the FPS graph. Times are passed in by the caller
/// (`performance.now()` in the browser) so the tracker itself stays pure.
pub struct FpsGraph {
    frame_times: VecDeque<(f64, f64)>, // (timestamp, duration) pairs in milliseconds
    session_start: f64,
    last_frame_start: Option<f64>,
    last_export: f64,
    total_frames: u32,
    export_interval: f64,

    history: VecDeque<f64>,
    history_len: usize,
    latest: Option<FpsSample>,
}

impl FpsGraph {
    pub fn new(config: &FpsGraphConfig, now: f64) -> Self {
        Self {
            frame_times: VecDeque::new(),
            session_start: now,
            last_frame_start: None,
            last_export: now,
            total_frames: 0,
            export_interval: config.export_interval_ms,
            history: VecDeque::with_capacity(config.history_len),
            history_len: config.history_len,
            latest: None,
        }
    }

    pub fn begin(&mut self, now: f64) {
        self.last_frame_start = Some(now);
    }

    /// Closes the frame opened by `begin`. Returns a sample when the export
    /// interval has elapsed; the sample is also pushed onto the graph history.
    pub fn end(&mut self, now: f64, instance_count: u32) -> Option<FpsSample> {
        let frame_start = self.last_frame_start.take()?;
        let frame_duration = (now - frame_start).max(0.0);

        self.frame_times.push_back((frame_start, frame_duration));
        self.total_frames += 1;

        // Drop frames that started more than a second ago
        let window_start = now - WINDOW_MS;
        while let Some(&(timestamp, _)) = self.frame_times.front() {
            if timestamp < window_start {
                self.frame_times.pop_front();
            } else {
                break;
            }
        }

        if now - self.last_export < self.export_interval {
            return None;
        }
        self.last_export = now;

        let sample = self.snapshot(now, instance_count);
        if self.history.len() == self.history_len {
            self.history.pop_front();
        }
        self.history.push_back(sample.fps);
        self.latest = Some(sample);
        Some(sample)
    }

    pub fn snapshot(&self, now: f64, instance_count: u32) -> FpsSample {
        let timestamp = now - self.session_start;
        if self.frame_times.is_empty() {
            return FpsSample {
                timestamp,
                fps: 0.0,
                frame_time_ms: 0.0,
                min_frame_time: 0.0,
                max_frame_time: 0.0,
                frame_count: self.total_frames,
                instance_count,
            };
        }

        let window_size = self.frame_times.len() as f64;
        let durations = self.frame_times.iter().map(|&(_, duration)| duration);

        FpsSample {
            timestamp,
            fps: window_size, // frames in 1 second = FPS
            frame_time_ms: durations.clone().sum::<f64>() / window_size,
            min_frame_time: durations.clone().fold(f64::INFINITY, f64::min),
            max_frame_time: durations.fold(0.0, f64::max),
            frame_count: self.total_frames,
            instance_count,
        }
    }

    pub fn latest(&self) -> Option<FpsSample> {
        self.latest
    }

    /// FPS values for the graph, oldest first.
    pub fn history(&self) -> Vec<f32> {
        self.history.iter().map(|&fps| fps as f32).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph() -> FpsGraph {
        FpsGraph::new(&FpsGraphConfig::default(), 0.0)
    }

    /// Runs `frames` frames of `duration` ms each, one every `period` ms.
    fn run(graph: &mut FpsGraph, start: f64, frames: usize, period: f64, duration: f64) -> f64 {
        let mut t = start;
        for _ in 0..frames {
            graph.begin(t);
            graph.end(t + duration, 0);
            t += period;
        }
        t
    }

    #[test]
    fn end_without_begin_is_ignored() {
        let mut graph = graph();
        assert!(graph.end(500.0, 0).is_none());
        assert_eq!(graph.snapshot(500.0, 0).frame_count, 0);
    }

    #[test]
    fn counts_frames_in_last_second() {
        let mut graph = graph();
        let now = run(&mut graph, 0.0, 180, 1000.0 / 60.0, 4.0);
        let sample = graph.snapshot(now, 12);
        assert!((59.0..=61.0).contains(&sample.fps), "fps was {}", sample.fps);
        assert_eq!(sample.frame_count, 180);
        assert_eq!(sample.instance_count, 12);
        assert!((sample.frame_time_ms - 4.0).abs() < 1e-9);
        assert!((sample.min_frame_time - 4.0).abs() < 1e-9);
        assert!((sample.max_frame_time - 4.0).abs() < 1e-9);
    }

    #[test]
    fn exports_at_interval() {
        let mut graph = graph();
        graph.begin(10.0);
        assert!(graph.end(20.0, 0).is_none());
        graph.begin(100.0);
        let sample = graph.end(110.0, 3).unwrap();
        assert_eq!(sample.frame_count, 2);
        assert_eq!(graph.latest(), Some(sample));
        assert_eq!(graph.history(), vec![2.0]);
    }

    #[test]
    fn history_is_bounded() {
        let config = FpsGraphConfig {
            export_interval_ms: 100.0,
            history_len: 5,
        };
        let mut graph = FpsGraph::new(&config, 0.0);
        run(&mut graph, 0.0, 100, 100.0, 1.0);
        assert_eq!(graph.history().len(), 5);
    }

    #[test]
    fn slow_frames_show_up_in_max() {
        let mut graph = graph();
        let t = run(&mut graph, 0.0, 10, 16.0, 2.0);
        graph.begin(t);
        graph.end(t + 250.0, 0);
        let sample = graph.snapshot(t + 250.0, 0);
        assert_eq!(sample.max_frame_time, 250.0);
        assert_eq!(sample.min_frame_time, 2.0);
    }
}
