// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]
#![deny(unsafe_code)]

//! # stringscope
//!
//! Static recovery of string literals hidden by string-encryption obfuscators in
//! .NET-style bytecode modules.
//!
//! Obfuscators of this family replace every `ldstr "literal"` with a pair of
//! instructions: a constant integer load followed by a call into a decoder routine
//! that rebuilds the literal at runtime from an embedded data blob. `stringscope`
//! recovers those literals **without executing anything**: it locates the blob,
//! classifies the decoder routines, finds every `ldc.i4` / `call` pair, tries a fixed
//! list of decoding strategies against the blob and rewrites each resolved pair into a
//! direct string load.
//!
//! ## Features
//!
//! - **🔍 Non-executing** - No emulation, no runtime; pure static analysis of the instruction stream
//! - **🧩 Strategy list** - Direct, end-relative, scaled, transformed and XOR-keyed blob offsets
//! - **🛡️ Conservative patching** - Failed call sites stay untouched; patched ones keep stack depth and instruction count
//! - **⚡ Parallel** - Routines are processed independently on the rayon thread pool
//!
//! ## Quick Start
//!
//! ```rust
//! use stringscope::prelude::*;
//!
//! let mut blob = vec![0x05, 0x00, 0x00, 0x00];
//! blob.extend_from_slice(b"hello");
//!
//! let decoder = Token::new(0x0600_0001);
//! let mut module = ModuleBuilder::new()
//!     .data_slot(DataSlot::global(Token::new(0x0400_0001), "data", blob))
//!     .routine(Routine::new(decoder, "Decode").with_signature(RoutineSignature::decoder()))
//!     .routine(
//!         Routine::new(Token::new(0x0600_0002), "Main").with_body(vec![
//!             Instruction::load_int(0),
//!             Instruction::call(decoder),
//!             Instruction::ret(),
//!         ]),
//!     )
//!     .build();
//!
//! let engine = StringDecryptionEngine::new(EngineConfig::default());
//! let report = engine.run(&mut module)?;
//!
//! assert_eq!(report.recovered(), 1);
//! # Ok::<(), stringscope::Error>(())
//! ```
//!
//! ## Architecture
//!
//! - [`assembly`] - The abstract module view the engine works on: routines, instructions,
//!   static data slots and the [`assembly::ModuleProvider`] trait
//! - [`metadata`] - Metadata tokens identifying routines, slots and external members
//! - [`deobfuscation`] - Blob location, decoder classification, call-site scanning,
//!   decoding strategies, validation, patching and the run report
//! - [`Error`] and [`Result`] - Error handling
//!
//! Loading a module from disk and writing the patched module back are the job of the
//! surrounding tool; `stringscope` only consumes a [`assembly::ModuleProvider`] and
//! edits its instruction streams in place.

#[macro_use]
pub(crate) mod error;

/// Convenient re-exports of the most commonly used types.
///
/// # Example
///
/// ```rust
/// use stringscope::prelude::*;
///
/// let engine = StringDecryptionEngine::new(EngineConfig::default());
/// ```
pub mod prelude;

/// Abstract view of a bytecode module: routines, instruction streams and static data slots.
pub mod assembly;

/// Metadata tokens.
pub mod metadata;

/// The string decryption engine and its components.
pub mod deobfuscation;

pub use error::Error;

/// The generic `Result` type used throughout this crate.
pub type Result<T> = std::result::Result<T, Error>;
