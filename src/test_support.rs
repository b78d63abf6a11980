use std::cell::{Cell, RefCell};
use std::path::{Path, PathBuf};
use std::rc::Rc;

use anyhow::{bail, Result};
use image::{Rgb, RgbImage, RgbaImage};

use crate::camera::{CameraBackend, StreamRequest, VideoStream};
use crate::session::{SessionEvent, SessionObserver, SessionSnapshot};

pub struct FakeCamera {
    frame: Option<RgbImage>,
    metadata_after: u32,
    metadata_gap: Option<MetadataGap>,
    failing_frames: bool,
    opens: Rc<Cell<u32>>,
}

/// Frame size goes missing after `after` answers, for `queries` queries or
/// for good when `None`.
#[derive(Clone, Copy)]
struct MetadataGap {
    after: u32,
    queries: Option<u32>,
}

impl FakeCamera {
    pub fn from_frame(frame: RgbImage) -> Self {
        Self {
            frame: Some(frame),
            metadata_after: 0,
            metadata_gap: None,
            failing_frames: false,
            opens: Rc::new(Cell::new(0)),
        }
    }

    pub fn solid(width: u32, height: u32, rgb: [u8; 3]) -> Self {
        Self::from_frame(RgbImage::from_pixel(width, height, Rgb(rgb)))
    }

    pub fn denied() -> Self {
        Self {
            frame: None,
            ..Self::solid(1, 1, [0, 0, 0])
        }
    }

    /// Report no frame size for the first `polls` queries.
    pub fn metadata_after(mut self, polls: u32) -> Self {
        self.metadata_after = polls;
        self
    }

    /// Stop reporting the frame size after `answers` successful queries.
    pub fn metadata_lost_after(mut self, answers: u32) -> Self {
        self.metadata_gap = Some(MetadataGap {
            after: answers,
            queries: None,
        });
        self
    }

    /// After `answers` successful queries, report no frame size for the next
    /// `queries` queries, then recover.
    pub fn metadata_gap(mut self, answers: u32, queries: u32) -> Self {
        self.metadata_gap = Some(MetadataGap {
            after: answers,
            queries: Some(queries),
        });
        self
    }

    pub fn failing_frames(mut self) -> Self {
        self.failing_frames = true;
        self
    }

    pub fn opens(&self) -> Rc<Cell<u32>> {
        self.opens.clone()
    }
}

pub struct FakeStream {
    frame: RgbImage,
    pending_polls: Cell<u32>,
    gap: Option<MetadataGap>,
    answered: Cell<u32>,
    gap_seen: Cell<u32>,
    failing: bool,
}

impl CameraBackend for FakeCamera {
    type Stream = FakeStream;

    fn request_stream(&mut self, _request: &StreamRequest) -> Result<FakeStream> {
        self.opens.set(self.opens.get() + 1);
        let Some(frame) = self.frame.clone() else {
            bail!("permission denied");
        };
        Ok(FakeStream {
            frame,
            pending_polls: Cell::new(self.metadata_after),
            gap: self.metadata_gap,
            answered: Cell::new(0),
            gap_seen: Cell::new(0),
            failing: self.failing_frames,
        })
    }
}

impl VideoStream for FakeStream {
    fn resolution(&self) -> Option<(u32, u32)> {
        let pending = self.pending_polls.get();
        if pending > 0 {
            self.pending_polls.set(pending - 1);
            return None;
        }
        if let Some(gap) = self.gap {
            let seen = self.gap_seen.get();
            if self.answered.get() >= gap.after && gap.queries.map_or(true, |q| seen < q) {
                self.gap_seen.set(seen + 1);
                return None;
            }
        }
        self.answered.set(self.answered.get() + 1);
        Some(self.frame.dimensions())
    }

    fn capture_frame(&mut self) -> Result<RgbImage> {
        if self.failing {
            bail!("device unplugged");
        }
        Ok(self.frame.clone())
    }
}

/// Records every event with the session snapshot taken when it fired.
#[derive(Default, Clone)]
pub struct RecordingObserver {
    events: Rc<RefCell<Vec<(SessionEvent, SessionSnapshot)>>>,
}

impl RecordingObserver {
    pub fn events(&self) -> Vec<(SessionEvent, SessionSnapshot)> {
        self.events.borrow().clone()
    }
}

impl SessionObserver for RecordingObserver {
    fn on_event(&self, event: &SessionEvent, snapshot: &SessionSnapshot) {
        self.events.borrow_mut().push((event.clone(), *snapshot));
    }
}

pub fn write_png(dir: &Path, name: &str, image: &RgbaImage) -> PathBuf {
    let path = dir.join(name);
    image.save(&path).unwrap();
    path
}
