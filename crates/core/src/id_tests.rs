// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn issued_ids_are_unique_and_monotonic() {
    let ids = WorkerIdGen::new();
    let a = ids.issue();
    let b = ids.issue();
    let c = ids.issue();

    assert!(a < b);
    assert!(b < c);
}

#[test]
fn display_is_stable() {
    assert_eq!(WorkerId(7).to_string(), "worker-7");
}
