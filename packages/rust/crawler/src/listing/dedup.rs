use std::collections::HashMap;

use chapterscrape_shared::MemberStub;

/// Collapse stubs sharing a profile URL.
///
/// The survivor sits where the URL was first seen and carries the values of
/// the last stub observed for it.
pub fn dedup_by_profile_url(stubs: Vec<MemberStub>) -> Vec<MemberStub> {
    let mut position: HashMap<String, usize> = HashMap::new();
    let mut out: Vec<MemberStub> = Vec::with_capacity(stubs.len());

    for stub in stubs {
        match position.get(&stub.profile_url) {
            Some(&i) => out[i] = stub,
            None => {
                position.insert(stub.profile_url.clone(), out.len());
                out.push(stub);
            }
        }
    }
    out
}
