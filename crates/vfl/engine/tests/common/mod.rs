#![allow(dead_code)]

use std::fmt::Write as _;
use std::ops::Range;
use std::path::{Path, PathBuf};
use vfl_cluster::{Cluster, LocalBackend};
use vfl_types::PipelineConfig;

const JOBS: [&str; 5] = ["admin", "technician", "unknown", "services", "management"];
const MARITAL: [&str; 3] = ["single", "married", "divorced"];

pub fn age(uid: usize) -> usize {
    20 + (uid * 37) % 60
}

pub fn balance(uid: usize) -> usize {
    (uid * 7919) % 3000
}

pub fn label(uid: usize) -> u8 {
    u8::from(age(uid) > 60 || balance(uid) > 2400)
}

fn yes_no(flag: bool) -> &'static str {
    if flag {
        "yes"
    } else {
        "no"
    }
}

/// Alice's feature table for `uids`
pub fn alice_csv(uids: Range<usize>) -> String {
    let mut csv = String::from("uid,age,job,marital,default\n");
    for uid in uids {
        writeln!(
            csv,
            "{uid},{},{},{},{}",
            age(uid),
            JOBS[(uid * 7) % JOBS.len()],
            MARITAL[(uid * 11) % MARITAL.len()],
            yes_no(uid % 13 == 0)
        )
        .expect("write to string");
    }
    csv
}

/// Bob's table for `uids`, rows written in reverse key order
pub fn bob_csv(uids: Range<usize>) -> String {
    let mut csv = String::from("uid,balance,housing,loan,y\n");
    for uid in uids.rev() {
        writeln!(
            csv,
            "{uid},{},{},{},{}",
            balance(uid),
            yes_no((uid * 3) % 4 < 2),
            yes_no(uid % 6 == 0),
            label(uid)
        )
        .expect("write to string");
    }
    csv
}

pub fn write_inputs(dir: &Path, alice: Range<usize>, bob: Range<usize>) -> (PathBuf, PathBuf) {
    let alice_path = dir.join("alice.csv");
    let bob_path = dir.join("bob.csv");
    std::fs::write(&alice_path, alice_csv(alice)).expect("alice csv should be written");
    std::fs::write(&bob_path, bob_csv(bob)).expect("bob csv should be written");
    (alice_path, bob_path)
}

/// Bank-marketing style configuration loaded through the config layer
pub fn config(dir: &Path, alice: &Path, bob: &Path, matching: bool) -> PipelineConfig {
    let yaml = format!(
        r#"
role: bob
cluster:
  self_party: bob
  parties:
    alice:
      address: "127.0.0.1:9494"
      listen_addr: "0.0.0.0:9494"
    bob:
      address: "127.0.0.1:9495"
      listen_addr: "0.0.0.0:9495"
secure_unit:
  nodes:
    - party: alice
      address: "127.0.0.1:9596"
    - party: bob
      address: "127.0.0.1:9597"
matching:
  enabled: {matching}
  output_dir: "{output_dir}"
data:
  inputs:
    alice: "{alice}"
    bob: "{bob}"
  keys: uid
  drop_keys: uid
preprocess:
  fill_unknown_cols: [job]
  binary_cols: [default, housing, loan]
  ordinal_cols: [job]
  onehot_cols: [marital]
  label_col: y
"#,
        output_dir = dir.join("psi_results").display(),
        alice = alice.display(),
        bob = bob.display(),
    );
    let path = dir.join("pipeline.yaml");
    std::fs::write(&path, yaml).expect("config should be written");
    PipelineConfig::load(path.to_str().expect("utf-8 temp path")).expect("config should load")
}

pub async fn cluster(config: &PipelineConfig) -> Cluster {
    Cluster::init(&config.cluster, &config.secure_unit, &LocalBackend::new())
        .await
        .expect("local cluster should start")
}
