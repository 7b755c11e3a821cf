use crate::foundation::error::{CollageError, CollageResult};

pub const MSG_NO_WALLET: &str = "Please enter a wallet address";
pub const MSG_INVALID_WALLET: &str = "Please enter a valid Ethereum address";

/// `^0x[0-9a-fA-F]{40}$` after trimming. Returns the trimmed address.
pub fn validate_wallet(input: &str) -> CollageResult<&str> {
    let addr = input.trim();
    if addr.is_empty() {
        return Err(CollageError::user_input(MSG_NO_WALLET));
    }
    let valid = addr
        .strip_prefix("0x")
        .is_some_and(|hex| hex.len() == 40 && hex.bytes().all(|b| b.is_ascii_hexdigit()));
    if !valid {
        return Err(CollageError::user_input(MSG_INVALID_WALLET));
    }
    Ok(addr)
}

/// Ordered, duplicate-free indices into the session's NFT list.
///
/// Order is the slot order: entry 0 lands in grid slot 1.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Selection {
    order: Vec<usize>,
    min: usize,
    max: usize,
}

impl Selection {
    pub fn new(min: usize, max: usize) -> Self {
        Self {
            order: Vec::new(),
            min,
            max,
        }
    }

    /// Validate a complete order in one go (CLI path).
    pub fn from_order(order: Vec<usize>, min: usize, max: usize) -> CollageResult<Self> {
        let mut sel = Self::new(min, max);
        for idx in order {
            if sel.contains(idx) {
                return Err(CollageError::user_input(format!(
                    "NFT #{idx} is selected more than once"
                )));
            }
            sel.add(idx)?;
        }
        sel.ensure_ready()?;
        Ok(sel)
    }

    /// `(min, max)` selection size.
    pub fn bounds(&self) -> (usize, usize) {
        (self.min, self.max)
    }

    pub fn order(&self) -> &[usize] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn contains(&self, idx: usize) -> bool {
        self.order.contains(&idx)
    }

    fn add(&mut self, idx: usize) -> CollageResult<()> {
        if self.order.len() >= self.max {
            return Err(CollageError::user_input(format!(
                "You can select maximum {} NFTs",
                self.max
            )));
        }
        self.order.push(idx);
        Ok(())
    }

    /// Deselect if present, otherwise append. Fails when already at the maximum.
    pub fn toggle(&mut self, idx: usize) -> CollageResult<bool> {
        if let Some(pos) = self.order.iter().position(|&i| i == idx) {
            self.order.remove(pos);
            return Ok(false);
        }
        self.add(idx)?;
        Ok(true)
    }

    /// Swap two order positions (drag-and-drop reorder).
    pub fn swap(&mut self, a: usize, b: usize) -> CollageResult<()> {
        let len = self.order.len();
        if a >= len || b >= len {
            return Err(CollageError::user_input(format!(
                "cannot swap positions {a} and {b} in a selection of {len}"
            )));
        }
        self.order.swap(a, b);
        Ok(())
    }

    /// Gate for proceeding to the collage.
    pub fn ensure_ready(&self) -> CollageResult<()> {
        if self.order.len() < self.min {
            return Err(CollageError::user_input(format!(
                "Please select at least {} NFTs",
                self.min
            )));
        }
        Ok(())
    }
}
