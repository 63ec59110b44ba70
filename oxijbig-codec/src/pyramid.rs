//! Bookkeeping for the resolution pyramid.
//!
//! - [`SdeStore`] tracks every stripe data entity of an encoder run from
//!   "not generated" through "buffered" to "flushed".
//! - [`PlanePyramid`] holds the two resident layers of one bit plane.
//! - [`LoopCursor`] walks `(stripe, layer, plane)` in the nesting selected by
//!   the order flags. The encoder and the decoder share it.

use crate::config::Order;
use oxijbig_core::bitmap::Bitmap;
use oxijbig_core::error::{JbigError, Result};

/// Identifies one stripe data entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SdeKey {
    /// Stripe index.
    pub stripe: u32,
    /// Resolution layer.
    pub layer: u8,
    /// Bit plane.
    pub plane: u8,
}

// ============================================================================
// SDE store
// ============================================================================

/// Lifecycle of one stripe data entity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SdeState {
    /// Not encoded yet.
    #[default]
    NotGenerated,
    /// Encoded and waiting for its turn in the output order.
    Buffered(Vec<u8>),
    /// Written to the output and released.
    Flushed,
}

/// State of every SDE of an encoder run, indexed by stripe, layer and plane.
#[derive(Debug)]
pub struct SdeStore {
    stripes: u32,
    layers: usize,
    planes: usize,
    states: Vec<SdeState>,
}

impl SdeStore {
    /// Create a store for `stripes x layers x planes` entities.
    pub fn new(stripes: u32, layers: usize, planes: usize) -> Result<Self> {
        let len = (stripes as usize)
            .checked_mul(layers)
            .and_then(|n| n.checked_mul(planes))
            .ok_or_else(|| JbigError::out_of_memory(usize::MAX))?;
        let mut states = Vec::new();
        states.try_reserve_exact(len).map_err(|_| {
            JbigError::out_of_memory(len.saturating_mul(size_of::<SdeState>()))
        })?;
        states.resize_with(len, SdeState::default);
        Ok(Self {
            stripes,
            layers,
            planes,
            states,
        })
    }

    /// Number of stripes per layer.
    pub fn stripes(&self) -> u32 {
        self.stripes
    }

    #[inline]
    fn index(&self, key: SdeKey) -> usize {
        debug_assert!(key.stripe < self.stripes);
        debug_assert!(usize::from(key.layer) < self.layers);
        debug_assert!(usize::from(key.plane) < self.planes);
        (key.stripe as usize * self.layers + usize::from(key.layer)) * self.planes
            + usize::from(key.plane)
    }

    /// Current state of an entity.
    pub fn state(&self, key: SdeKey) -> &SdeState {
        &self.states[self.index(key)]
    }

    /// Returns true if the entity has been encoded (buffered or flushed).
    pub fn is_generated(&self, key: SdeKey) -> bool {
        !matches!(self.state(key), SdeState::NotGenerated)
    }

    /// Store freshly encoded data.
    pub fn store(&mut self, key: SdeKey, data: Vec<u8>) {
        let index = self.index(key);
        self.states[index] = SdeState::Buffered(data);
    }

    /// Take buffered data for output, marking the entity as flushed.
    ///
    /// Returns `None` if the entity is not buffered.
    pub fn take(&mut self, key: SdeKey) -> Option<Vec<u8>> {
        let index = self.index(key);
        match std::mem::replace(&mut self.states[index], SdeState::Flushed) {
            SdeState::Buffered(data) => Some(data),
            other => {
                self.states[index] = other;
                None
            }
        }
    }
}

// ============================================================================
// Plane pyramid
// ============================================================================

/// The two resident layers of one bit plane.
///
/// `highres` selects the buffer holding the layer currently being coded;
/// the other buffer receives the next resolution reduction.
#[derive(Debug)]
pub struct PlanePyramid {
    buffers: [Bitmap; 2],
    highres: usize,
}

impl PlanePyramid {
    /// Start with the full resolution image.
    pub fn new(image: Bitmap) -> Result<Self> {
        Ok(Self {
            buffers: [image, Bitmap::new(0, 0)?],
            highres: 0,
        })
    }

    /// The layer currently being coded.
    #[inline]
    pub fn current(&self) -> &Bitmap {
        &self.buffers[self.highres]
    }

    /// The layer below the current one.
    #[inline]
    pub fn lower(&self) -> &Bitmap {
        &self.buffers[self.highres ^ 1]
    }

    /// Replace the lower buffer.
    pub fn set_lower(&mut self, image: Bitmap) {
        self.buffers[self.highres ^ 1] = image;
    }

    /// Make the lower buffer the current one.
    pub fn flip(&mut self) {
        self.highres ^= 1;
    }
}

// ============================================================================
// Loop order
// ============================================================================

const STRIPE: usize = 0;
const LAYER: usize = 1;
const PLANE: usize = 2;

/// Nesting level of (stripe, layer, plane) for every order value; level 0
/// is the outermost loop.
const NESTING: [Option<[usize; 3]>; 8] = [
    Some([2, 1, 0]),
    None,
    Some([2, 0, 1]),
    Some([1, 0, 2]),
    Some([0, 2, 1]),
    Some([1, 2, 0]),
    Some([0, 1, 2]),
    None,
];

/// Walks all SDE keys of a BIE in transmission order.
#[derive(Debug, Clone)]
pub struct LoopCursor {
    level: [usize; 3],
    start: [u32; 3],
    end: [u32; 3],
    pos: [u32; 3],
    hitolo: bool,
    finished: bool,
}

impl LoopCursor {
    /// Create a cursor over `stripes` stripes, layers `dl..=dh` and
    /// `planes` planes.
    pub fn new(order: Order, stripes: u32, dl: u8, dh: u8, planes: u8) -> Result<Self> {
        let level = NESTING[order.nesting()].ok_or_else(|| {
            JbigError::invalid_parameter(format!("illegal order {:#04x}", order.bits()))
        })?;
        let mut start = [0u32; 3];
        let mut end = [0u32; 3];
        end[level[STRIPE]] = stripes.saturating_sub(1);
        start[level[LAYER]] = u32::from(dl);
        end[level[LAYER]] = u32::from(dh);
        end[level[PLANE]] = u32::from(planes.saturating_sub(1));
        Ok(Self {
            level,
            start,
            end,
            pos: start,
            hitolo: order.contains(Order::HITOLO),
            finished: stripes == 0 || planes == 0,
        })
    }

    /// Returns true after the last key has been passed.
    #[inline]
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// The key at the current position.
    pub fn current(&self) -> SdeKey {
        let mut layer = self.pos[self.level[LAYER]];
        if self.hitolo {
            let dl = self.start[self.level[LAYER]];
            let dh = self.end[self.level[LAYER]];
            layer = dh - (layer - dl);
        }
        SdeKey {
            stripe: self.pos[self.level[STRIPE]],
            layer: layer as u8,
            plane: self.pos[self.level[PLANE]] as u8,
        }
    }

    /// Move to the next key.
    pub fn advance(&mut self) {
        if self.finished {
            return;
        }
        self.pos[2] += 1;
        self.carry();
    }

    /// Change the number of stripes, moving the position to the next valid
    /// key if the current one no longer exists.
    pub fn set_stripes(&mut self, stripes: u32) {
        if stripes == 0 {
            self.finished = true;
            return;
        }
        self.end[self.level[STRIPE]] = stripes - 1;
        if !self.finished {
            self.carry();
        }
    }

    /// Propagate positions past their end outwards.
    fn carry(&mut self) {
        for k in (0..3).rev() {
            if self.pos[k] > self.end[k] {
                if k == 0 {
                    self.finished = true;
                    return;
                }
                self.pos[k..].copy_from_slice(&self.start[k..]);
                self.pos[k - 1] += 1;
            }
        }
    }
}
