// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

use super::Marshal;
use crate::error::{Error, Result};
use crate::types::is_compatible;
use crate::value::Value;

/// Writes Rust values into a raw [`Value`].
#[derive(Debug)]
pub struct Encoder<'v> {
    value: &'v Value,
}

impl<'v> Encoder<'v> {
    pub fn new(value: &'v Value) -> Self {
        Self { value }
    }

    /// Encode `x` into the target value.
    ///
    /// Fails with [`Error::TypeIncompatible`] when `T`'s descriptor does not
    /// match the value's. Slices grow as needed.
    pub fn encode<T: Marshal>(&self, x: &T) -> Result<()> {
        let target = self.value.descriptor();
        let source = T::describe(self.value.arena().registry())?;
        if !is_compatible(target, &source) {
            return Err(Error::incompatible(target.name(), source.name()));
        }
        log::trace!("[marshal] encode {} into {}", source.name(), target.name());
        x.encode_into(self.value)
    }
}
