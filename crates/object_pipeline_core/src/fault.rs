//! Chaos hook that corrupts a storage target to exercise failure handling.
//!
//! Injectors are built per invocation and handed to the stage handlers, so a
//! fixed seed (or a scripted sequence) reproduces the same substitutions.

use std::collections::VecDeque;

use chrono::Utc;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::contract::{ObjectLocation, Stage};

pub const FAULT_SENTINEL: u32 = 1;
pub const DEFAULT_UPPER_BOUND: u32 = 15;
pub const DELETE_UPPER_BOUND: u32 = 3;
pub const WRONG_BUCKET_NAME: &str = "wrong-bucket-name";
pub const WRONG_KEY_NAME: &str = "wrong-key-name";

pub trait FaultInjector {
    /// Whether the next storage call should be pointed at an invalid target.
    fn should_fail(&mut self) -> bool;
}

impl<T: FaultInjector + ?Sized> FaultInjector for Box<T> {
    fn should_fail(&mut self) -> bool {
        (**self).should_fail()
    }
}

/// Inclusive draw range `0..=upper_bound`; the call fails when the draw hits `sentinel`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FaultPolicy {
    pub upper_bound: u32,
    pub sentinel: u32,
}

impl FaultPolicy {
    pub fn with_upper_bound(upper_bound: u32) -> Self {
        Self {
            upper_bound,
            sentinel: FAULT_SENTINEL,
        }
    }

    pub fn for_stage(stage: Stage) -> Self {
        match stage {
            Stage::Delete => Self::with_upper_bound(DELETE_UPPER_BOUND),
            Stage::Create | Stage::Check | Stage::Update => {
                Self::with_upper_bound(DEFAULT_UPPER_BOUND)
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct RandomFaultInjector {
    policy: FaultPolicy,
    rng: StdRng,
}

impl RandomFaultInjector {
    pub fn new(policy: FaultPolicy, seed: u64) -> Self {
        Self {
            policy,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn from_clock(policy: FaultPolicy) -> Self {
        Self::new(policy, clock_seed())
    }

    pub fn policy(&self) -> FaultPolicy {
        self.policy
    }
}

impl FaultInjector for RandomFaultInjector {
    fn should_fail(&mut self) -> bool {
        self.rng.gen_range(0..=self.policy.upper_bound) == self.policy.sentinel
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NeverFail;

impl FaultInjector for NeverFail {
    fn should_fail(&mut self) -> bool {
        false
    }
}

/// Replays a fixed sequence of decisions, then never fails.
#[derive(Debug, Clone, Default)]
pub struct ScriptedFaultInjector {
    decisions: VecDeque<bool>,
}

impl ScriptedFaultInjector {
    pub fn new(decisions: impl IntoIterator<Item = bool>) -> Self {
        Self {
            decisions: decisions.into_iter().collect(),
        }
    }
}

impl FaultInjector for ScriptedFaultInjector {
    fn should_fail(&mut self) -> bool {
        self.decisions.pop_front().unwrap_or(false)
    }
}

/// Which half of the location a stage corrupts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultTarget {
    Bucket,
    Key,
}

impl FaultTarget {
    pub fn for_stage(stage: Stage) -> Self {
        match stage {
            Stage::Check => Self::Key,
            Stage::Create | Stage::Update | Stage::Delete => Self::Bucket,
        }
    }
}

/// Draws once and returns the location to actually write to.
pub fn apply_fault(
    location: &ObjectLocation,
    target: FaultTarget,
    injector: &mut dyn FaultInjector,
) -> ObjectLocation {
    if !injector.should_fail() {
        return location.clone();
    }

    match target {
        FaultTarget::Bucket => ObjectLocation::new(WRONG_BUCKET_NAME, location.key.clone()),
        FaultTarget::Key => ObjectLocation::new(location.bucket.clone(), WRONG_KEY_NAME),
    }
}

/// Bucket name variant of [`apply_fault`] for bucket-wide operations.
pub fn apply_bucket_fault(bucket: &str, injector: &mut dyn FaultInjector) -> String {
    if injector.should_fail() {
        WRONG_BUCKET_NAME.to_string()
    } else {
        bucket.to_string()
    }
}

fn clock_seed() -> u64 {
    let now = Utc::now();
    now.timestamp_nanos_opt()
        .map(|nanos| nanos as u64)
        .unwrap_or_else(|| now.timestamp_millis() as u64)
}
