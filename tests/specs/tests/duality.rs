// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! End-to-end client/server duality (§8 property 7): whenever both sides of
//! a handshake succeed, they must agree on the same negotiated version and
//! parameters, across a range of version-table shapes, not just the single
//! S1 fixture.

use proptest::prelude::*;
use tproto_specs::support::{min_negotiator, run_pair, versions};

#[tokio::test]
async fn both_sides_agree_on_s1s_fixture() {
    let client_versions = versions(&[(1, 10), (2, 20), (3, 30)]);
    let server_versions = versions(&[(2, 15), (3, 25), (4, 40)]);

    let (client, server) = run_pair(client_versions, min_negotiator(), server_versions, min_negotiator()).await;
    assert_eq!(client.unwrap(), server.unwrap());
}

#[tokio::test]
async fn both_sides_agree_when_tables_are_identical() {
    let client_versions = versions(&[(1, 1), (2, 2)]);
    let server_versions = versions(&[(1, 1), (2, 2)]);

    let (client, server) = run_pair(client_versions, min_negotiator(), server_versions, min_negotiator()).await;
    assert_eq!(client.unwrap(), server.unwrap());
}

#[tokio::test]
async fn both_sides_agree_that_a_disjoint_pair_fails_the_same_way() {
    let client_versions = versions(&[(1, 1)]);
    let server_versions = versions(&[(2, 2)]);

    let (client, server) = run_pair(client_versions, min_negotiator(), server_versions, min_negotiator()).await;
    assert_eq!(client.unwrap_err().to_string(), server.unwrap_err().to_string());
}

proptest! {
    /// §8.7: for any two version tables and a symmetric negotiator, the
    /// client and server either both succeed with the identical
    /// `(version, params)` pair or both fail — never one succeeding while
    /// the other disagrees or fails.
    #[test]
    fn duality_holds_across_arbitrary_overlapping_tables(
        shared in prop::collection::btree_set(1u64..16, 1..6),
        client_only in prop::collection::btree_set(16u64..32, 0..4),
        server_only in prop::collection::btree_set(32u64..48, 0..4),
    ) {
        let rt = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
        rt.block_on(async {
            let client_pairs: Vec<(u64, i64)> =
                shared.iter().chain(client_only.iter()).map(|v| (*v, *v as i64 * 10)).collect();
            let server_pairs: Vec<(u64, i64)> =
                shared.iter().chain(server_only.iter()).map(|v| (*v, *v as i64 * 10)).collect();

            let (client, server) =
                run_pair(versions(&client_pairs), min_negotiator(), versions(&server_pairs), min_negotiator()).await;

            match (client, server) {
                (Ok(c), Ok(s)) => prop_assert_eq!(c, s),
                (Err(c), Err(s)) => prop_assert_eq!(c.to_string(), s.to_string()),
                other => prop_assert!(false, "client and server disagreed on success: {other:?}"),
            }
            Ok(())
        })?;
    }
}
