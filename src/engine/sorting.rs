use rand::{rngs::StdRng, Rng};
use serde_json::json;

use super::Frame;
use crate::types::SortingVariant;

pub const ARRAY_LEN: usize = 24;

fn snapshot(data: &[i32], cost: f64, heuristic: f64) -> Frame {
    Frame {
        visual_state: json!({ "bars": data, "markers": [] }),
        cost,
        heuristic,
    }
}

/// Sorting run over a private array.
///
/// Each variant is an explicit state machine so steps are produced one at a
/// time. After the variant runs out, one completion frame with the sorted
/// array and a zero heuristic closes the run.
pub(super) struct Sorter {
    data: Vec<i32>,
    cost: f64,
    machine: Machine,
    completed: bool,
}

enum Machine {
    Merge(MergeSort),
    Quick(QuickSort),
    Heap(HeapSort),
}

impl Sorter {
    pub(super) fn new(variant: SortingVariant, rng: &mut StdRng) -> Self {
        let data: Vec<i32> = (0..ARRAY_LEN).map(|_| rng.random_range(5..99)).collect();
        let machine = match variant {
            SortingVariant::MergeSort => Machine::Merge(MergeSort::new(data.len())),
            SortingVariant::QuickSort => Machine::Quick(QuickSort::new(data.len())),
            SortingVariant::HeapSort => Machine::Heap(HeapSort::new(data.len())),
        };

        Self {
            data,
            cost: 0.0,
            machine,
            completed: false,
        }
    }

    pub(super) fn next_frame(&mut self) -> Option<Frame> {
        if self.completed {
            return None;
        }

        let frame = match &mut self.machine {
            Machine::Merge(m) => m.step(&mut self.data, &mut self.cost),
            Machine::Quick(q) => q.step(&mut self.data, &mut self.cost),
            Machine::Heap(h) => h.step(&mut self.data, &mut self.cost),
        };

        match frame {
            Some(frame) => Some(frame),
            None => {
                self.completed = true;
                Some(snapshot(&self.data, self.cost, 0.0))
            }
        }
    }
}

/// Iterative bottom-up merge sort, one frame per merged window
struct MergeSort {
    size: usize,
    left_start: usize,
    buffer: Vec<i32>,
}

impl MergeSort {
    fn new(len: usize) -> Self {
        Self {
            size: 1,
            left_start: 0,
            buffer: vec![0; len],
        }
    }

    fn step(&mut self, data: &mut [i32], cost: &mut f64) -> Option<Frame> {
        let len = data.len();
        while self.size < len {
            if self.left_start < len - 1 {
                let left = self.left_start;
                let mid = (left + self.size - 1).min(len - 1);
                let right_end = (left + 2 * self.size - 1).min(len - 1);

                merge(data, &mut self.buffer, left, mid, right_end);
                self.left_start += 2 * self.size;
                *cost += (right_end - left) as f64;
                return Some(snapshot(data, *cost, self.size as f64));
            }

            self.size *= 2;
            self.left_start = 0;
        }
        None
    }
}

fn merge(data: &mut [i32], buffer: &mut [i32], left: usize, mid: usize, right: usize) {
    let (mut i, mut j, mut k) = (left, mid + 1, left);
    while i <= mid && j <= right {
        if data[i] <= data[j] {
            buffer[k] = data[i];
            i += 1;
        } else {
            buffer[k] = data[j];
            j += 1;
        }
        k += 1;
    }
    while i <= mid {
        buffer[k] = data[i];
        i += 1;
        k += 1;
    }
    while j <= right {
        buffer[k] = data[j];
        j += 1;
        k += 1;
    }
    data[left..=right].copy_from_slice(&buffer[left..=right]);
}

enum QuickTask {
    /// Inclusive bounds; may be empty or inverted
    Range { left: isize, right: isize },
    /// Lomuto partition in progress
    Partition {
        left: usize,
        right: usize,
        scan: usize,
        boundary: usize,
        pivot: i32,
    },
}

/// Lomuto quicksort driven by an explicit stack instead of recursion.
/// The left subrange is pushed last so it is finished before the right one.
struct QuickSort {
    stack: Vec<QuickTask>,
}

impl QuickSort {
    fn new(len: usize) -> Self {
        Self {
            stack: vec![QuickTask::Range {
                left: 0,
                right: len as isize - 1,
            }],
        }
    }

    fn step(&mut self, data: &mut [i32], cost: &mut f64) -> Option<Frame> {
        loop {
            match self.stack.last_mut()? {
                QuickTask::Range { left, right } => {
                    let (left, right) = (*left, *right);
                    self.stack.pop();
                    if left >= right {
                        continue;
                    }
                    let (left, right) = (left as usize, right as usize);
                    self.stack.push(QuickTask::Partition {
                        left,
                        right,
                        scan: left,
                        boundary: left,
                        pivot: data[right],
                    });
                }
                QuickTask::Partition {
                    left,
                    right,
                    scan,
                    boundary,
                    pivot,
                } => {
                    let span = (*right - *left) as f64;

                    while *scan < *right {
                        let i = *scan;
                        *scan += 1;
                        if data[i] <= *pivot {
                            data.swap(i, *boundary);
                            *boundary += 1;
                            *cost += 1.0;
                            return Some(snapshot(data, *cost, span));
                        }
                    }

                    let (left, right, boundary) = (*left, *right, *boundary);
                    data.swap(boundary, right);
                    *cost += 1.0;
                    self.stack.pop();
                    self.stack.push(QuickTask::Range {
                        left: boundary as isize + 1,
                        right: right as isize,
                    });
                    self.stack.push(QuickTask::Range {
                        left: left as isize,
                        right: boundary as isize - 1,
                    });
                    return Some(snapshot(data, *cost, span));
                }
            }
        }
    }
}

/// Heap sort; the max-heap is built silently before the first frame
struct HeapSort {
    built: bool,
    end: usize,
}

impl HeapSort {
    fn new(len: usize) -> Self {
        Self {
            built: false,
            end: len.saturating_sub(1),
        }
    }

    fn step(&mut self, data: &mut [i32], cost: &mut f64) -> Option<Frame> {
        if !self.built {
            let len = data.len();
            for root in (0..len / 2).rev() {
                sift_down(data, len, root, cost);
            }
            self.built = true;
        }

        if self.end == 0 {
            return None;
        }

        let end = self.end;
        data.swap(0, end);
        *cost += 1.0;
        let frame = snapshot(data, *cost, end as f64);
        sift_down(data, end, 0, cost);
        self.end -= 1;
        Some(frame)
    }
}

fn sift_down(data: &mut [i32], heap_size: usize, mut root: usize, cost: &mut f64) {
    loop {
        let mut largest = root;
        let left = 2 * root + 1;
        let right = 2 * root + 2;

        if left < heap_size && data[left] > data[largest] {
            largest = left;
        }
        if right < heap_size && data[right] > data[largest] {
            largest = right;
        }
        if largest == root {
            return;
        }

        data.swap(root, largest);
        *cost += 1.0;
        root = largest;
    }
}
