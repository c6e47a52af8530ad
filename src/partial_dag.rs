// SPDX-License-Identifier: Apache-2.0

//! Partial DAGs: candidate gate-connection skeletons in which some fanins
//! are fixed to earlier steps and the rest are left free for the SAT solver
//! to bind to primary inputs.

use std::fmt;
use std::io::{Read, Write};

/// One fanin slot of a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Fanin {
    /// Bound to a primary input chosen at solve time.
    Free,
    /// A fixed primary input.
    Input(usize),
    /// A fixed earlier step.
    Step(usize),
}

/// An ordered sequence of 2-fanin steps.
///
/// Invariants: a step only references strictly earlier steps, and the second
/// slot may be free only when the first one is.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PartialDag {
    steps: Vec<[Fanin; 2]>,
}

impl PartialDag {
    pub fn new(steps: Vec<[Fanin; 2]>) -> Result<Self, DagError> {
        for (i, slots) in steps.iter().enumerate() {
            for fanin in slots {
                if let Fanin::Step(s) = fanin {
                    if *s >= i {
                        return Err(DagError::ForwardReference { step: i, target: *s });
                    }
                }
            }
            if slots[1] == Fanin::Free && slots[0] != Fanin::Free {
                return Err(DagError::FreeSlotOrder { step: i });
            }
        }
        Ok(PartialDag { steps })
    }

    pub fn num_steps(&self) -> usize {
        self.steps.len()
    }

    pub fn step(&self, i: usize) -> [Fanin; 2] {
        self.steps[i]
    }

    /// Number of free slots of step `i` (0, 1, or 2).
    pub fn free_slots(&self, i: usize) -> usize {
        let [a, b] = self.steps[i];
        if b == Fanin::Free {
            2
        } else if a == Fanin::Free {
            1
        } else {
            0
        }
    }

    /// How many times each step is referenced by a later step's fixed fanin.
    pub fn fixed_use_counts(&self) -> Vec<usize> {
        let mut counts = vec![0; self.steps.len()];
        for slots in &self.steps {
            for fanin in slots {
                if let Fanin::Step(s) = fanin {
                    counts[*s] += 1;
                }
            }
        }
        counts
    }

    /// Reads a concatenated stream of skeleton records until EOF.
    ///
    /// Record format, all values little-endian `i32`: a step count, then two
    /// fanin values per step. A fanin is 0 for a free slot; values
    /// `1..num_inputs` name a primary input (1-based), and values
    /// `>= num_inputs` name step `value - num_inputs`. A short read inside a
    /// record means the file is corrupt and aborts the load.
    pub fn read_all(mut r: impl Read, num_inputs: usize) -> Result<Vec<PartialDag>, SkeletonIoError> {
        let mut dags = Vec::new();
        loop {
            let step_count = match read_i32_opt(&mut r)? {
                None => break,
                Some(v) => v,
            };
            if step_count < 0 {
                return Err(SkeletonIoError::BadStepCount(step_count));
            }
            let mut steps = Vec::with_capacity(step_count as usize);
            for i in 0..step_count as usize {
                let mut slots = [Fanin::Free; 2];
                for slot in &mut slots {
                    let v = read_i32(&mut r)?;
                    *slot = decode_fanin(v, num_inputs, i)?;
                }
                steps.push(slots);
            }
            dags.push(PartialDag::new(steps).map_err(SkeletonIoError::BadDag)?);
        }
        Ok(dags)
    }

    /// Writes skeleton records in the format `read_all` accepts.
    pub fn write_all(
        mut w: impl Write,
        dags: &[PartialDag],
        num_inputs: usize,
    ) -> Result<(), SkeletonIoError> {
        for dag in dags {
            write_i32(&mut w, dag.num_steps() as i32)?;
            for slots in &dag.steps {
                for fanin in slots {
                    let v = match fanin {
                        Fanin::Free => 0,
                        Fanin::Input(i) => {
                            if i + 1 >= num_inputs {
                                return Err(SkeletonIoError::UnencodableInput(*i));
                            }
                            (i + 1) as i32
                        }
                        Fanin::Step(s) => (num_inputs + s) as i32,
                    };
                    write_i32(&mut w, v)?;
                }
            }
        }
        Ok(())
    }
}

fn decode_fanin(v: i32, num_inputs: usize, step: usize) -> Result<Fanin, SkeletonIoError> {
    if v < 0 {
        return Err(SkeletonIoError::BadFanin { value: v, step });
    }
    let v = v as usize;
    if v == 0 {
        Ok(Fanin::Free)
    } else if v < num_inputs {
        Ok(Fanin::Input(v - 1))
    } else {
        Ok(Fanin::Step(v - num_inputs))
    }
}

fn read_i32(r: &mut impl Read) -> Result<i32, SkeletonIoError> {
    match read_i32_opt(r)? {
        Some(v) => Ok(v),
        None => Err(SkeletonIoError::Truncated),
    }
}

/// Reads one value, or `None` on clean EOF at a record boundary.
fn read_i32_opt(r: &mut impl Read) -> Result<Option<i32>, SkeletonIoError> {
    let mut buf = [0u8; 4];
    let mut filled = 0;
    while filled < 4 {
        let n = r.read(&mut buf[filled..]).map_err(SkeletonIoError::Io)?;
        if n == 0 {
            return if filled == 0 {
                Ok(None)
            } else {
                Err(SkeletonIoError::Truncated)
            };
        }
        filled += n;
    }
    Ok(Some(i32::from_le_bytes(buf)))
}

fn write_i32(w: &mut impl Write, v: i32) -> Result<(), SkeletonIoError> {
    w.write_all(&v.to_le_bytes()).map_err(SkeletonIoError::Io)
}

#[derive(Debug)]
pub enum DagError {
    ForwardReference { step: usize, target: usize },
    FreeSlotOrder { step: usize },
}

impl fmt::Display for DagError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DagError::ForwardReference { step, target } => {
                write!(f, "step {} references step {} ahead of it", step, target)
            }
            DagError::FreeSlotOrder { step } => {
                write!(f, "step {} has a free second slot but a fixed first slot", step)
            }
        }
    }
}

impl std::error::Error for DagError {}

#[derive(Debug)]
pub enum SkeletonIoError {
    Io(std::io::Error),
    Truncated,
    BadStepCount(i32),
    BadFanin { value: i32, step: usize },
    BadDag(DagError),
    UnencodableInput(usize),
}

impl fmt::Display for SkeletonIoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkeletonIoError::Io(e) => write!(f, "skeleton stream i/o error: {}", e),
            SkeletonIoError::Truncated => write!(f, "skeleton stream ends mid-record"),
            SkeletonIoError::BadStepCount(v) => write!(f, "bad skeleton step count {}", v),
            SkeletonIoError::BadFanin { value, step } => {
                write!(f, "bad fanin value {} at step {}", value, step)
            }
            SkeletonIoError::BadDag(e) => write!(f, "invalid skeleton: {}", e),
            SkeletonIoError::UnencodableInput(i) => {
                write!(f, "input reference {} does not fit the stream encoding", i)
            }
        }
    }
}

impl std::error::Error for SkeletonIoError {}

#[cfg(test)]
mod tests {
    use super::*;

    fn dag(steps: Vec<[Fanin; 2]>) -> PartialDag {
        PartialDag::new(steps).unwrap()
    }

    #[test]
    fn test_invariants_rejected() {
        assert!(PartialDag::new(vec![[Fanin::Step(0), Fanin::Free]]).is_err());
        assert!(PartialDag::new(vec![[Fanin::Free, Fanin::Step(1)]]).is_err());
        assert!(PartialDag::new(vec![[Fanin::Free, Fanin::Free]]).is_ok());
    }

    #[test]
    fn test_free_slots() {
        let d = dag(vec![
            [Fanin::Free, Fanin::Free],
            [Fanin::Free, Fanin::Step(0)],
            [Fanin::Step(0), Fanin::Step(1)],
        ]);
        assert_eq!(d.free_slots(0), 2);
        assert_eq!(d.free_slots(1), 1);
        assert_eq!(d.free_slots(2), 0);
        assert_eq!(d.fixed_use_counts(), vec![2, 1, 0]);
    }

    #[test]
    fn test_stream_round_trip() {
        let dags = vec![
            dag(vec![[Fanin::Free, Fanin::Free]]),
            dag(vec![
                [Fanin::Free, Fanin::Free],
                [Fanin::Free, Fanin::Step(0)],
                [Fanin::Step(0), Fanin::Step(1)],
            ]),
        ];
        let mut buf = Vec::new();
        PartialDag::write_all(&mut buf, &dags, 3).unwrap();
        assert_eq!(buf.len(), 4 * (1 + 2 * 1 + 1 + 2 * 3));
        let back = PartialDag::read_all(&buf[..], 3).unwrap();
        assert_eq!(back, dags);
    }

    #[test]
    fn test_truncated_stream_is_fatal() {
        let dags = vec![dag(vec![[Fanin::Free, Fanin::Free]])];
        let mut buf = Vec::new();
        PartialDag::write_all(&mut buf, &dags, 3).unwrap();
        buf.pop();
        assert!(matches!(
            PartialDag::read_all(&buf[..], 3).unwrap_err(),
            SkeletonIoError::Truncated
        ));
    }
}
