// Copyright 2026 the Grebe Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Frame allocator stack discipline.

use grebe_gfx::{FrameScope, MemStack};

#[test]
fn release_returns_to_the_exact_prior_state() {
    let mut stack = MemStack::new(256);
    // Warm the chain so the comparison is not against the empty state.
    stack.alloc(32);

    let before = stack.next_alloc_pos();
    stack.alloc(64);
    stack.release(64);
    assert_eq!(stack.next_alloc_pos(), before);

    stack.release(32);
}

#[test]
fn scope_unwinds_spilled_blocks_on_drop() {
    let mut stack = MemStack::new(128);
    let before = stack.next_alloc_pos();
    {
        let mut scope = FrameScope::new(&mut stack);
        let row = scope.alloc(96);
        scope.buf_mut(row).fill(0xAB);
        // The second allocation spills into a fresh block; the scope drop
        // still releases both in reverse order.
        let spill = scope.alloc(96);
        assert_eq!(scope.buf_mut(spill).len(), 96);
    }
    assert_eq!(stack.next_alloc_pos(), before);
    assert_eq!(stack.allocated(), 0);
}

#[test]
fn clear_resets_without_shrinking() {
    let mut stack = MemStack::new(64);
    let a = stack.alloc(64);
    let b = stack.alloc(64);
    stack.buf_mut(a).fill(1);
    stack.buf_mut(b).fill(2);
    stack.release(64);
    stack.release(64);

    stack.clear();
    assert_eq!(stack.allocated(), 0);
    assert_eq!(stack.next_alloc_pos(), (0, 0));
}

#[test]
#[cfg(debug_assertions)]
#[should_panic(expected = "stack order")]
fn over_release_is_a_contract_violation() {
    let mut stack = MemStack::new(128);
    stack.alloc(16);
    stack.release(64);
}
