//! Terminal outcomes reported by cache operations.
//!
//! Each public operation reports exactly one outcome from its own
//! enumeration when it finishes. The cache does not aggregate them; it hands
//! them to an [`OutcomeRecorder`](crate::metrics::traits::OutcomeRecorder).

use std::fmt;

macro_rules! outcome_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $label:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// Stable lowercase label.
            pub fn label(self) -> &'static str {
                match self {
                    $($name::$variant => $label),+
                }
            }

            fn index(self) -> usize {
                self as usize
            }
        }
    };
}

outcome_enum!(
    /// Outcome of `get`.
    GetOutcome { Hit => "hit", Miss => "miss", Failure => "failure" }
);

outcome_enum!(
    /// Outcome of `get_all`.
    GetAllOutcome { Success => "success", Failure => "failure" }
);

outcome_enum!(
    /// Outcome of `put`.
    PutOutcome { Put => "put", Noop => "noop", Failure => "failure" }
);

outcome_enum!(
    /// Outcome of `put_all`.
    PutAllOutcome { Success => "success", Failure => "failure" }
);

outcome_enum!(
    /// Outcome of `remove`.
    RemoveOutcome { Success => "success", Noop => "noop", Failure => "failure" }
);

outcome_enum!(
    /// Outcome of `remove_all`.
    RemoveAllOutcome { Success => "success", Failure => "failure" }
);

outcome_enum!(
    /// Outcome of `remove_if`.
    ConditionalRemoveOutcome {
        Success => "success",
        FailureKeyMissing => "failure_key_missing",
        FailureKeyPresent => "failure_key_present",
        Failure => "failure",
    }
);

outcome_enum!(
    /// Outcome of `put_if_absent`.
    PutIfAbsentOutcome { Put => "put", Hit => "hit", Failure => "failure" }
);

outcome_enum!(
    /// Outcome of `replace` and `replace_if`.
    ReplaceOutcome {
        Hit => "hit",
        MissPresent => "miss_present",
        MissNotPresent => "miss_not_present",
        Failure => "failure",
    }
);

outcome_enum!(
    /// Outcome of `clear`.
    ClearOutcome { Success => "success", Failure => "failure" }
);

/// Most outcomes any single operation has.
pub(crate) const MAX_OUTCOMES: usize = 4;

/// Operations that report outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheOperation {
    Get,
    GetAll,
    Put,
    PutAll,
    Remove,
    RemoveAll,
    ConditionalRemove,
    PutIfAbsent,
    Replace,
    Clear,
}

impl CacheOperation {
    pub const ALL: &'static [CacheOperation] = &[
        CacheOperation::Get,
        CacheOperation::GetAll,
        CacheOperation::Put,
        CacheOperation::PutAll,
        CacheOperation::Remove,
        CacheOperation::RemoveAll,
        CacheOperation::ConditionalRemove,
        CacheOperation::PutIfAbsent,
        CacheOperation::Replace,
        CacheOperation::Clear,
    ];

    pub const COUNT: usize = Self::ALL.len();

    pub fn name(self) -> &'static str {
        match self {
            CacheOperation::Get => "get",
            CacheOperation::GetAll => "get_all",
            CacheOperation::Put => "put",
            CacheOperation::PutAll => "put_all",
            CacheOperation::Remove => "remove",
            CacheOperation::RemoveAll => "remove_all",
            CacheOperation::ConditionalRemove => "conditional_remove",
            CacheOperation::PutIfAbsent => "put_if_absent",
            CacheOperation::Replace => "replace",
            CacheOperation::Clear => "clear",
        }
    }

    /// Every outcome this operation can end with.
    pub fn outcomes(self) -> Vec<CacheOutcome> {
        match self {
            CacheOperation::Get => GetOutcome::ALL.iter().map(|o| CacheOutcome::Get(*o)).collect(),
            CacheOperation::GetAll => {
                GetAllOutcome::ALL.iter().map(|o| CacheOutcome::GetAll(*o)).collect()
            },
            CacheOperation::Put => PutOutcome::ALL.iter().map(|o| CacheOutcome::Put(*o)).collect(),
            CacheOperation::PutAll => {
                PutAllOutcome::ALL.iter().map(|o| CacheOutcome::PutAll(*o)).collect()
            },
            CacheOperation::Remove => {
                RemoveOutcome::ALL.iter().map(|o| CacheOutcome::Remove(*o)).collect()
            },
            CacheOperation::RemoveAll => RemoveAllOutcome::ALL
                .iter()
                .map(|o| CacheOutcome::RemoveAll(*o))
                .collect(),
            CacheOperation::ConditionalRemove => ConditionalRemoveOutcome::ALL
                .iter()
                .map(|o| CacheOutcome::ConditionalRemove(*o))
                .collect(),
            CacheOperation::PutIfAbsent => PutIfAbsentOutcome::ALL
                .iter()
                .map(|o| CacheOutcome::PutIfAbsent(*o))
                .collect(),
            CacheOperation::Replace => {
                ReplaceOutcome::ALL.iter().map(|o| CacheOutcome::Replace(*o)).collect()
            },
            CacheOperation::Clear => {
                ClearOutcome::ALL.iter().map(|o| CacheOutcome::Clear(*o)).collect()
            },
        }
    }
}

/// One terminal outcome of one operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheOutcome {
    Get(GetOutcome),
    GetAll(GetAllOutcome),
    Put(PutOutcome),
    PutAll(PutAllOutcome),
    Remove(RemoveOutcome),
    RemoveAll(RemoveAllOutcome),
    ConditionalRemove(ConditionalRemoveOutcome),
    PutIfAbsent(PutIfAbsentOutcome),
    Replace(ReplaceOutcome),
    Clear(ClearOutcome),
}

impl CacheOutcome {
    pub fn operation(self) -> CacheOperation {
        match self {
            CacheOutcome::Get(_) => CacheOperation::Get,
            CacheOutcome::GetAll(_) => CacheOperation::GetAll,
            CacheOutcome::Put(_) => CacheOperation::Put,
            CacheOutcome::PutAll(_) => CacheOperation::PutAll,
            CacheOutcome::Remove(_) => CacheOperation::Remove,
            CacheOutcome::RemoveAll(_) => CacheOperation::RemoveAll,
            CacheOutcome::ConditionalRemove(_) => CacheOperation::ConditionalRemove,
            CacheOutcome::PutIfAbsent(_) => CacheOperation::PutIfAbsent,
            CacheOutcome::Replace(_) => CacheOperation::Replace,
            CacheOutcome::Clear(_) => CacheOperation::Clear,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            CacheOutcome::Get(o) => o.label(),
            CacheOutcome::GetAll(o) => o.label(),
            CacheOutcome::Put(o) => o.label(),
            CacheOutcome::PutAll(o) => o.label(),
            CacheOutcome::Remove(o) => o.label(),
            CacheOutcome::RemoveAll(o) => o.label(),
            CacheOutcome::ConditionalRemove(o) => o.label(),
            CacheOutcome::PutIfAbsent(o) => o.label(),
            CacheOutcome::Replace(o) => o.label(),
            CacheOutcome::Clear(o) => o.label(),
        }
    }

    /// `(operation, outcome)` slot in a dense counter table.
    pub(crate) fn slot(self) -> (usize, usize) {
        let outcome = match self {
            CacheOutcome::Get(o) => o.index(),
            CacheOutcome::GetAll(o) => o.index(),
            CacheOutcome::Put(o) => o.index(),
            CacheOutcome::PutAll(o) => o.index(),
            CacheOutcome::Remove(o) => o.index(),
            CacheOutcome::RemoveAll(o) => o.index(),
            CacheOutcome::ConditionalRemove(o) => o.index(),
            CacheOutcome::PutIfAbsent(o) => o.index(),
            CacheOutcome::Replace(o) => o.index(),
            CacheOutcome::Clear(o) => o.index(),
        };
        (self.operation() as usize, outcome)
    }
}

impl fmt::Display for CacheOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.operation().name(), self.label())
    }
}

macro_rules! impl_from_outcome {
    ($($variant:ident($ty:ty)),+ $(,)?) => {
        $(
            impl From<$ty> for CacheOutcome {
                fn from(outcome: $ty) -> Self {
                    CacheOutcome::$variant(outcome)
                }
            }
        )+
    };
}

impl_from_outcome!(
    Get(GetOutcome),
    GetAll(GetAllOutcome),
    Put(PutOutcome),
    PutAll(PutAllOutcome),
    Remove(RemoveOutcome),
    RemoveAll(RemoveAllOutcome),
    ConditionalRemove(ConditionalRemoveOutcome),
    PutIfAbsent(PutIfAbsentOutcome),
    Replace(ReplaceOutcome),
    Clear(ClearOutcome),
);
