// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

use super::Marshal;
use crate::error::{Error, Result};
use crate::types::is_compatible;
use crate::value::Value;

/// Reads Rust values out of a raw [`Value`].
#[derive(Debug)]
pub struct Decoder<'v> {
    value: &'v Value,
}

impl<'v> Decoder<'v> {
    pub fn new(value: &'v Value) -> Self {
        Self { value }
    }

    /// Decode the source value as a `T`. Sequences are allocated with
    /// exactly the source length.
    pub fn decode<T: Marshal>(&self) -> Result<T> {
        let source = self.value.descriptor();
        let target = T::describe(self.value.arena().registry())?;
        if !is_compatible(&target, source) {
            return Err(Error::incompatible(target.name(), source.name()));
        }
        log::trace!("[marshal] decode {} as {}", source.name(), target.name());
        T::decode_from(self.value)
    }
}
