mod bloodsugar;
mod chart;
mod consumption;
mod helpers;
mod settings;
mod stats;
mod user;

pub(crate) use bloodsugar::{cmd_bg_list, cmd_bg_log};
pub(crate) use chart::{cmd_chart, cmd_graph_list, cmd_graph_show};
pub(crate) use consumption::{LogEntry, cmd_history, cmd_log};
pub(crate) use helpers::{parse_time, parse_utc_offset};
pub(crate) use settings::cmd_spike_factor;
pub(crate) use stats::{cmd_stats, cmd_variability};
pub(crate) use user::{cmd_user_add, cmd_user_show};
