// Copyright 2026 the Memo Graph Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Wind-tunnel benchmark crate for `memo_graph`.
//!
//! All content lives in `benches/`; this library target is intentionally
//! empty.
