//! Fixtures shared by the stage tests

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use vfl_cluster::{Cluster, LocalBackend};
use vfl_types::{
    ClusterConfig, LinkConfig, PartyConfig, PartyName, SecureNodeConfig, SecureRuntimeConfig,
    SecureUnitConfig,
};

pub fn cluster_config() -> ClusterConfig {
    let mut parties = BTreeMap::new();
    for (name, port) in [("alice", 9494), ("bob", 9495)] {
        parties.insert(
            PartyName::new(name),
            PartyConfig {
                address: format!("127.0.0.1:{port}"),
                listen_addr: format!("0.0.0.0:{port}"),
            },
        );
    }
    ClusterConfig {
        parties,
        self_party: PartyName::new("bob"),
        runtime_address: "local".into(),
        log_to_driver: true,
        cluster_mode: true,
    }
}

pub fn unit_config() -> SecureUnitConfig {
    SecureUnitConfig {
        nodes: ["alice", "bob"]
            .iter()
            .enumerate()
            .map(|(i, name)| SecureNodeConfig {
                party: PartyName::new(*name),
                address: format!("127.0.0.1:{}", 9596 + i),
            })
            .collect(),
        runtime: SecureRuntimeConfig::default(),
        link: LinkConfig::default(),
    }
}

/// A fresh local cluster
pub async fn cluster() -> Cluster {
    Cluster::init(&cluster_config(), &unit_config(), &LocalBackend::new())
        .await
        .unwrap()
}

pub fn write_inputs(dir: &Path, alice: &str, bob: &str) -> BTreeMap<PartyName, PathBuf> {
    let mut inputs = BTreeMap::new();
    for (name, body) in [("alice", alice), ("bob", bob)] {
        let path = dir.join(format!("{name}.csv"));
        std::fs::write(&path, body).unwrap();
        inputs.insert(PartyName::new(name), path);
    }
    inputs
}

/// A small bank-marketing style table split between the two parties
pub fn write_bank_inputs(dir: &Path, rows: usize) -> BTreeMap<PartyName, PathBuf> {
    let jobs = ["admin", "tech", "unknown", "services"];
    let marital = ["single", "married", "divorced"];
    let mut alice = String::from("uid,age,job,marital,default\n");
    let mut bob = String::from("uid,balance,housing,loan,y\n");
    for i in 0..rows {
        let age = 20 + (i * 7) % 50;
        let y = u8::from(i % 3 == 0 || age > 55);
        alice.push_str(&format!(
            "{i},{age},{},{},{}\n",
            jobs[i % jobs.len()],
            marital[i % marital.len()],
            if i % 5 == 0 { "yes" } else { "no" }
        ));
        bob.push_str(&format!(
            "{i},{},{},{},{y}\n",
            (i * 37) % 1000,
            if i % 2 == 0 { "yes" } else { "no" },
            if i % 4 == 0 { "yes" } else { "no" },
        ));
    }
    write_inputs(dir, &alice, &bob)
}
