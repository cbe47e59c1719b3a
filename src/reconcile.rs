// This file is part of the terraform-provider-citrix project
//
// Copyright (C) ANEO, 2024-2024. All rights reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License")
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

use std::collections::HashMap;
use std::hash::Hash;

/// Merge a keyed remote collection into the prior state
///
/// Prior elements whose key still exists remotely keep their position and are
/// refreshed from the remote entry. Prior elements whose key disappeared are
/// dropped. Remote entries that were not matched are appended in remote order.
pub fn reconcile<P, R, K, KP, KR, F>(
    prior: Vec<P>,
    remote: &[R],
    prior_key: KP,
    remote_key: KR,
    mut refresh: F,
) -> Vec<P>
where
    K: Eq + Hash,
    KP: Fn(&P) -> Option<K>,
    KR: Fn(&R) -> K,
    F: FnMut(Option<P>, &R) -> P,
{
    let mut index: HashMap<K, usize> = HashMap::with_capacity(remote.len());
    for (i, entry) in remote.iter().enumerate() {
        index.entry(remote_key(entry)).or_insert(i);
    }

    let mut visited = vec![false; remote.len()];
    let mut result = Vec::with_capacity(remote.len());

    for element in prior {
        let Some(key) = prior_key(&element) else {
            continue;
        };
        if let Some(&i) = index.get(&key) {
            if !visited[i] {
                visited[i] = true;
                result.push(refresh(Some(element), &remote[i]));
            }
        }
    }

    for (i, entry) in remote.iter().enumerate() {
        if !visited[i] && index.get(&remote_key(entry)) == Some(&i) {
            result.push(refresh(None, entry));
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, PartialEq, Debug)]
    struct Item {
        key: String,
        value: u32,
    }

    fn item(key: &str, value: u32) -> Item {
        Item {
            key: key.into(),
            value,
        }
    }

    fn run(prior: Vec<Item>, remote: &[(&str, u32)]) -> Vec<Item> {
        reconcile(
            prior,
            remote,
            |p: &Item| Some(p.key.clone()),
            |r: &(&str, u32)| r.0.to_owned(),
            |_, r| item(r.0, r.1),
        )
    }

    #[test]
    fn prior_order_is_kept_and_values_refreshed() {
        let prior = vec![item("b", 0), item("a", 0)];
        let result = run(prior, &[("a", 1), ("b", 2)]);
        assert_eq!(result, vec![item("b", 2), item("a", 1)]);
    }

    #[test]
    fn removed_keys_are_dropped_and_new_keys_appended() {
        let prior = vec![item("gone", 0), item("kept", 0)];
        let result = run(prior, &[("new2", 3), ("kept", 1), ("new1", 2)]);
        assert_eq!(result, vec![item("kept", 1), item("new2", 3), item("new1", 2)]);
    }

    #[test]
    fn reconciling_twice_is_stable() {
        let remote = [("x", 1), ("y", 2), ("z", 3)];
        let once = run(vec![item("z", 0), item("x", 0)], &remote);
        let twice = run(once.clone(), &remote);
        assert_eq!(once, twice);
    }

    #[test]
    fn every_remote_key_appears_exactly_once() {
        let remote = [("x", 1), ("y", 2)];
        let result = run(vec![item("y", 0), item("y", 5), item("w", 0)], &remote);
        let keys: Vec<_> = result.iter().map(|i| i.key.as_str()).collect();
        assert_eq!(keys, vec!["y", "x"]);
    }

    #[test]
    fn refresh_sees_prior_element() {
        let result = reconcile(
            vec![item("a", 7)],
            &[("a", 1)],
            |p: &Item| Some(p.key.clone()),
            |r: &(&str, u32)| r.0.to_owned(),
            |prior, r| item(r.0, prior.map_or(0, |p| p.value) + r.1),
        );
        assert_eq!(result, vec![item("a", 8)]);
    }
}
