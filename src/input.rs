/* Relative displacement input, pulled once per control cycle */

use log::{debug, error, warn};
use nalgebra as na;
use std::collections::VecDeque;
use std::io::BufRead;
use std::thread;
use tokio::sync::mpsc::{self, error::TryRecvError, UnboundedReceiver, UnboundedSender};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputSample {
    Displacement(na::Vector3<f64>),
    /// Clutch: pause if tracking, otherwise re-anchor at this reading.
    TogglePause(na::Vector3<f64>),
    Quit,
}

pub trait InputSource {
    fn sample(&mut self) -> InputSample;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    IncreaseX,
    DecreaseX,
    IncreaseY,
    DecreaseY,
    IncreaseZ,
    DecreaseZ,
    Clutch,
    Quit,
}

impl Key {
    // w a s d j i for x y z
    pub fn from_char(c: char) -> Option<Self> {
        match c.to_ascii_lowercase() {
            'w' => Some(Key::IncreaseX),
            's' => Some(Key::DecreaseX),
            'a' => Some(Key::IncreaseY),
            'd' => Some(Key::DecreaseY),
            'i' => Some(Key::IncreaseZ),
            'j' => Some(Key::DecreaseZ),
            'p' => Some(Key::Clutch),
            'q' => Some(Key::Quit),
            _ => None,
        }
    }

    /// Keys sharing a slot take effect at most once per sample.
    fn slot(self) -> Option<usize> {
        match self {
            Key::IncreaseX | Key::DecreaseX => Some(0),
            Key::IncreaseY | Key::DecreaseY => Some(1),
            Key::IncreaseZ | Key::DecreaseZ => Some(2),
            Key::Clutch => Some(3),
            Key::Quit => None,
        }
    }
}

/// Running offset built from per-axis increment/decrement edges.
#[derive(Debug, Clone)]
pub struct KeyAccumulator {
    offset: na::Vector3<f64>,
    step: f64,
    clutch: bool,
    quit: bool,
}

impl KeyAccumulator {
    pub fn new(step: f64) -> Self {
        Self { offset: na::Vector3::zeros(), step, clutch: false, quit: false }
    }

    pub fn apply(&mut self, key: Key) {
        match key {
            Key::IncreaseX => self.offset[0] += self.step,
            Key::DecreaseX => self.offset[0] -= self.step,
            Key::IncreaseY => self.offset[1] += self.step,
            Key::DecreaseY => self.offset[1] -= self.step,
            Key::IncreaseZ => self.offset[2] += self.step,
            Key::DecreaseZ => self.offset[2] -= self.step,
            Key::Clutch => self.clutch = !self.clutch,
            Key::Quit => self.quit = true,
        }
    }

    pub fn offset(&self) -> na::Vector3<f64> {
        self.offset
    }

    /// Sample for the keys applied since the previous call. A pending clutch
    /// press is reported once; an even number of presses cancels out.
    pub fn take_sample(&mut self) -> InputSample {
        if self.quit {
            return InputSample::Quit;
        }
        if std::mem::take(&mut self.clutch) {
            return InputSample::TogglePause(self.offset);
        }
        InputSample::Displacement(self.offset)
    }
}

/// Replays a fixed sequence of samples, then reports `Quit`.
#[derive(Debug, Clone, Default)]
pub struct ScriptedInput {
    samples: VecDeque<InputSample>,
}

impl ScriptedInput {
    pub fn new(samples: impl IntoIterator<Item = InputSample>) -> Self {
        Self { samples: samples.into_iter().collect() }
    }

    pub fn remaining(&self) -> usize {
        self.samples.len()
    }
}

impl InputSource for ScriptedInput {
    fn sample(&mut self) -> InputSample {
        self.samples.pop_front().unwrap_or(InputSample::Quit)
    }
}

/// Keyboard input typed on stdin. Every recognised character is one key
/// edge; unrecognised characters are ignored. Edges queue up and each axis
/// moves by at most one step per sample.
pub struct StdinKeys {
    keys: UnboundedReceiver<Key>,
    pending: VecDeque<Key>,
    accumulator: KeyAccumulator,
}

impl StdinKeys {
    /// Reads stdin on its own thread until the quit key or end of input.
    pub fn spawn(step: f64) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();

        let reader = thread::Builder::new()
            .name("stdin-keys".to_string())
            .spawn(move || forward_keys(std::io::stdin().lock(), &tx));
        if let Err(e) = reader {
            error!("Failed to start stdin reader: {}", e);
        }

        Self::from_receiver(rx, step)
    }

    pub fn from_receiver(keys: UnboundedReceiver<Key>, step: f64) -> Self {
        Self { keys, pending: VecDeque::new(), accumulator: KeyAccumulator::new(step) }
    }
}

impl InputSource for StdinKeys {
    fn sample(&mut self) -> InputSample {
        loop {
            match self.keys.try_recv() {
                Ok(key) => self.pending.push_back(key),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.pending.push_back(Key::Quit);
                    break;
                }
            }
        }

        let mut used = [false; 4];
        for key in std::mem::take(&mut self.pending) {
            match key.slot() {
                Some(slot) if used[slot] => self.pending.push_back(key),
                Some(slot) => {
                    used[slot] = true;
                    self.accumulator.apply(key);
                }
                None => self.accumulator.apply(key),
            }
        }
        self.accumulator.take_sample()
    }
}

/// Sends the keys typed on each line of `reader`. Stops after the quit key;
/// end of input and read errors count as quit.
fn forward_keys<R: BufRead>(reader: R, keys: &UnboundedSender<Key>) {
    for line in reader.lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                warn!("Failed to read stdin: {}", e);
                let _ = keys.send(Key::Quit);
                return;
            }
        };
        for key in line.chars().filter_map(Key::from_char) {
            if keys.send(key).is_err() || key == Key::Quit {
                return;
            }
        }
    }
    debug!("stdin closed");
    let _ = keys.send(Key::Quit);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_keys() {
        assert_eq!(Key::from_char('w'), Some(Key::IncreaseX));
        assert_eq!(Key::from_char('J'), Some(Key::DecreaseZ));
        assert_eq!(Key::from_char('q'), Some(Key::Quit));
        assert_eq!(Key::from_char('x'), None);
    }

    #[test]
    fn accumulates_steps_per_axis() {
        let mut acc = KeyAccumulator::new(0.001);
        for key in [Key::IncreaseX, Key::IncreaseX, Key::DecreaseY, Key::IncreaseZ, Key::DecreaseZ]
        {
            acc.apply(key);
        }
        let offset = acc.offset();
        assert!((offset[0] - 0.002).abs() < 1e-12);
        assert!((offset[1] + 0.001).abs() < 1e-12);
        assert_eq!(offset[2], 0.0);
        assert_eq!(acc.take_sample(), InputSample::Displacement(offset));
    }

    #[test]
    fn clutch_is_reported_once() {
        let mut acc = KeyAccumulator::new(0.01);
        acc.apply(Key::IncreaseX);
        acc.apply(Key::Clutch);
        assert_eq!(acc.take_sample(), InputSample::TogglePause(na::Vector3::new(0.01, 0.0, 0.0)));
        assert_eq!(acc.take_sample(), InputSample::Displacement(na::Vector3::new(0.01, 0.0, 0.0)));

        acc.apply(Key::Clutch);
        acc.apply(Key::Clutch);
        assert!(matches!(acc.take_sample(), InputSample::Displacement(_)));
    }

    #[test]
    fn quit_sticks() {
        let mut acc = KeyAccumulator::new(0.01);
        acc.apply(Key::Quit);
        acc.apply(Key::IncreaseX);
        assert_eq!(acc.take_sample(), InputSample::Quit);
        assert_eq!(acc.take_sample(), InputSample::Quit);
    }

    #[test]
    fn scripted_input_ends_with_quit() {
        let mut input = ScriptedInput::new([InputSample::Displacement(na::Vector3::zeros())]);
        assert_eq!(input.remaining(), 1);
        assert!(matches!(input.sample(), InputSample::Displacement(_)));
        assert_eq!(input.sample(), InputSample::Quit);
    }

    #[test]
    fn queued_keys_move_one_step_per_sample() {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut input = StdinKeys::from_receiver(rx, 0.5);

        assert_eq!(input.sample(), InputSample::Displacement(na::Vector3::zeros()));
        tx.send(Key::IncreaseY).unwrap();
        tx.send(Key::IncreaseY).unwrap();
        tx.send(Key::IncreaseX).unwrap();
        assert_eq!(input.sample(), InputSample::Displacement(na::Vector3::new(0.5, 0.5, 0.0)));
        assert_eq!(input.sample(), InputSample::Displacement(na::Vector3::new(0.5, 1.0, 0.0)));
        assert_eq!(input.sample(), InputSample::Displacement(na::Vector3::new(0.5, 1.0, 0.0)));

        drop(tx);
        assert_eq!(input.sample(), InputSample::Quit);
    }

    #[test]
    fn long_line_of_one_key_is_rate_limited() {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut input = StdinKeys::from_receiver(rx, 0.001);
        for _ in 0..100 {
            tx.send(Key::IncreaseX).unwrap();
        }

        for cycle in 1..=3 {
            let InputSample::Displacement(offset) = input.sample() else {
                panic!("expected a displacement");
            };
            assert!((offset[0] - 0.001 * cycle as f64).abs() < 1e-12);
        }
    }

    #[test]
    fn queued_clutch_presses_toggle_on_separate_samples() {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut input = StdinKeys::from_receiver(rx, 0.01);
        tx.send(Key::Clutch).unwrap();
        tx.send(Key::Clutch).unwrap();

        assert!(matches!(input.sample(), InputSample::TogglePause(_)));
        assert!(matches!(input.sample(), InputSample::TogglePause(_)));
        assert!(matches!(input.sample(), InputSample::Displacement(_)));
    }

    fn forwarded(text: &str) -> Vec<Key> {
        let (tx, mut rx) = mpsc::unbounded_channel();
        forward_keys(std::io::Cursor::new(text), &tx);
        drop(tx);
        let mut keys = Vec::new();
        while let Ok(key) = rx.try_recv() {
            keys.push(key);
        }
        keys
    }

    #[test]
    fn reader_stops_at_quit_key() {
        assert_eq!(forwarded("wq\nw\nd\n"), vec![Key::IncreaseX, Key::Quit]);
    }

    #[test]
    fn end_of_input_quits() {
        assert_eq!(forwarded("a x\n"), vec![Key::IncreaseY, Key::Quit]);
    }
}
