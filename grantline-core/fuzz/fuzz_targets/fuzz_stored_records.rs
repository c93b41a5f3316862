#![no_main]

use grantline_core::model::{Group, Track, User};
use grantline_core::resolve::{QueryContext, ResolutionOptions, Resolver};
use libfuzzer_sys::fuzz_target;
use std::collections::HashMap;

fuzz_target!(|data: &[u8]| {
    // records come straight off disk, so any bytes must be rejected cleanly
    let _ = serde_json::from_slice::<Track>(data);

    if let Ok(group) = serde_json::from_slice::<Group>(data) {
        let mut groups = HashMap::new();
        groups.insert(group.name().to_string(), group.clone());
        let resolver = Resolver::new(&groups, ResolutionOptions::default());
        let _ = resolver.resolve(&group, &QueryContext::global());
    }

    if let Ok(user) = serde_json::from_slice::<User>(data) {
        let groups: HashMap<String, Group> = HashMap::new();
        let resolved = Resolver::new(&groups, ResolutionOptions::default())
            .resolve(&user, &QueryContext::server("survival"));
        let _ = resolved.check("chat.color.red");
    }
});
