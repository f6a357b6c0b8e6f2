// Copyright (c) Walrus Foundation
// SPDX-License-Identifier: Apache-2.0

//! Metrics reported by the adjudicator.

use prometheus::{IntCounter, IntCounterVec};

/// Defines a struct of prometheus metrics registered under a common namespace.
macro_rules! define_metric_set {
    (
        #[namespace = $namespace:literal]
        $(#[$outer:meta])*
        $vis:vis struct $name:ident {
            $(
                #[help = $help_str:literal]
                $field_name:ident: $field_type:ident $field_def:tt
            ),* $(,)?
        }
    ) => {
        $(#[$outer])*
        #[derive(Debug, Clone)]
        $vis struct $name {
            $(
                #[doc = $help_str]
                pub $field_name: $field_type,
            )*
        }

        impl $name {
            /// The namespace in which the metrics reside.
            pub const NAMESPACE: &'static str = $namespace;

            /// Creates the metrics and registers them on `registry`.
            ///
            /// Fails if any of the metrics is already registered.
            pub fn new(registry: &::prometheus::Registry) -> Result<Self, ::prometheus::Error> {
                Ok(Self { $(
                    $field_name: {
                        let opts = ::prometheus::Opts::new(stringify!($field_name), $help_str)
                            .namespace($namespace);
                        let metric = create_metric!($field_type, opts, $field_def)?;
                        registry.register(Box::new(metric.clone()))?;
                        metric
                    },
                )* })
            }
        }
    };
}

macro_rules! create_metric {
    ($field_type:ty, $opts:expr, []) => {
        <$field_type>::with_opts($opts)
    };
    ($field_type:ty, $opts:expr, $label_names:expr) => {
        <$field_type>::new($opts, &$label_names)
    };
}

/// Returns the metric with the given label values.
macro_rules! with_label {
    ($metric:expr, $($label:expr),+$(,)?) => {
        $metric.with_label_values(&[$($label.as_ref()),+])
    };
}

pub(crate) use with_label;

define_metric_set! {
    #[namespace = "arbiter"]
    /// Metrics exported by the [`Adjudicator`][crate::Adjudicator].
    pub struct ChallengeMetricSet {
        #[help = "The number of submitted challenges, by outcome"]
        challenges_total: IntCounterVec["outcome"],

        #[help = "The total amount of stake slashed"]
        penalty_total: IntCounter[],
    }
}

/// The outcome label of a challenge that slashed the worker.
pub const OUTCOME_SLASHED: &str = "slashed";
/// The outcome label of a challenge against a correct fragment.
pub const OUTCOME_CLEARED: &str = "cleared";
