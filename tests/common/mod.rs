// SPDX-License-Identifier: PMPL-1.0-or-later

//! Shared fixtures for the integration tests

#![allow(dead_code)]

use simple_spa::{EngineProfile, QueryProcessor};

/// Three procedures, nineteen statements and seven variables
pub const SAMPLE_PROGRAM: &str = "
procedure main {
    read x;
    y = 0;
    count = x + y;
    call compute;
    while (count > 0) {
        count = count - 1;
        y = y + count * 2;
    }
    print y;
}

procedure compute {
    z = x * 3;
    if (z > 10) then {
        flag = 1;
    } else {
        flag = 0;
    }
    call report;
}

procedure report {
    while (flag != 0) {
        if (z >= y) then {
            total = z - y;
        } else {
            total = y - z;
        }
        flag = tmp;
    }
    print total;
}
";

pub fn processor(profile: EngineProfile) -> QueryProcessor {
    QueryProcessor::from_source(SAMPLE_PROGRAM, profile).expect("sample program is valid")
}

pub fn answers(profile: EngineProfile, query: &str) -> Vec<String> {
    processor(profile)
        .process(query)
        .unwrap_or_else(|err| panic!("query '{}' failed: {}", query, err))
}

pub fn bip_profile() -> EngineProfile {
    EngineProfile {
        enable_bip: true,
        ..EngineProfile::default()
    }
}
