//! Critical path method scheduling analysis.
//!
//! Builds one node per work item, wires predecessor/successor edges, and
//! runs forward/backward passes in topological order. Cycles are
//! detected up front; a cyclic graph still yields a result via a
//! visited-set fallback traversal, flagged with `has_cycles` because the
//! computed dates then under-estimate the true schedule.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};

use crate::config::ParameterSet;
use crate::core::types::{CriticalPathResult, ProjectSnapshot, ScheduleRisk, TaskNode};

/// Floats inside this tolerance count as zero
const FLOAT_EPSILON: f64 = 1e-9;

struct NodeSeed {
    id: u64,
    title: String,
    duration: f64,
    percent_complete: f64,
    predecessors: Vec<u64>,
    successors: Vec<u64>,
}

/// Compute the critical path result for one project
pub fn calculate_critical_path(
    snapshot: &ProjectSnapshot,
    params: &ParameterSet,
    now: DateTime<Utc>,
) -> CriticalPathResult {
    let mut data_complete = snapshot.data_complete;
    let seeds = build_seeds(snapshot, params, &mut data_complete);

    if seeds.is_empty() {
        return CriticalPathResult {
            project_id: snapshot.project_id,
            nodes: vec![],
            critical_path: vec![],
            project_duration_days: 0.0,
            schedule_risk: ScheduleRisk::Low,
            recommendations: im::Vector::new(),
            has_cycles: false,
            data_complete,
            calculation_date: now,
        };
    }

    let mut graph: DiGraph<u64, ()> = DiGraph::new();
    let mut index_of: HashMap<u64, NodeIndex> = HashMap::new();
    for seed in &seeds {
        index_of.insert(seed.id, graph.add_node(seed.id));
    }
    for seed in &seeds {
        for pred in &seed.predecessors {
            graph.add_edge(index_of[pred], index_of[&seed.id], ());
        }
    }

    let by_id: HashMap<u64, &NodeSeed> = seeds.iter().map(|s| (s.id, s)).collect();
    let (schedule, has_cycles) = match toposort(&graph, None) {
        Ok(order) => {
            let ordered: Vec<u64> = order.into_iter().map(|ix| graph[ix]).collect();
            (forward_backward(&ordered, &by_id), false)
        }
        Err(_) => (cyclic_fallback(&seeds, &by_id), true),
    };

    let project_duration_days = schedule
        .values()
        .map(|t| t.earliest_finish)
        .fold(0.0_f64, f64::max);

    let mut nodes: Vec<TaskNode> = seeds
        .iter()
        .map(|seed| {
            let times = &schedule[&seed.id];
            let total_float = times.latest_start - times.earliest_start;
            TaskNode {
                id: seed.id,
                title: seed.title.clone(),
                duration_days: seed.duration,
                earliest_start: times.earliest_start,
                earliest_finish: times.earliest_finish,
                latest_start: times.latest_start,
                latest_finish: times.latest_finish,
                total_float,
                is_critical: total_float.abs() < FLOAT_EPSILON,
                percent_complete: seed.percent_complete,
                predecessors: seed.predecessors.clone(),
                successors: seed.successors.clone(),
            }
        })
        .collect();
    nodes.sort_by(|a, b| {
        a.earliest_start
            .partial_cmp(&b.earliest_start)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.id.cmp(&b.id))
    });

    let critical_path: Vec<u64> = nodes.iter().filter(|n| n.is_critical).map(|n| n.id).collect();
    let (schedule_risk, recommendations) =
        assess_risk(&nodes, &critical_path, project_duration_days, has_cycles, data_complete);

    CriticalPathResult {
        project_id: snapshot.project_id,
        nodes,
        critical_path,
        project_duration_days,
        schedule_risk,
        recommendations,
        has_cycles,
        data_complete,
        calculation_date: now,
    }
}

/// Normalize work items into graph seeds, dropping edges that point at
/// unknown items
fn build_seeds(
    snapshot: &ProjectSnapshot,
    params: &ParameterSet,
    data_complete: &mut bool,
) -> Vec<NodeSeed> {
    let known: HashSet<u64> = snapshot.work_items.iter().map(|w| w.id).collect();

    let mut successor_sets: HashMap<u64, Vec<u64>> = HashMap::new();
    let mut seeds: Vec<NodeSeed> = snapshot
        .work_items
        .iter()
        .map(|item| {
            let mut predecessors = Vec::new();
            for pred in &item.predecessors {
                if known.contains(pred) && *pred != item.id {
                    predecessors.push(*pred);
                    successor_sets.entry(*pred).or_default().push(item.id);
                } else {
                    log::warn!(
                        "work item {} references unknown predecessor {pred}; edge dropped",
                        item.id
                    );
                    *data_complete = false;
                }
            }
            for succ in &item.successors {
                if known.contains(succ) && *succ != item.id {
                    successor_sets.entry(item.id).or_default().push(*succ);
                } else {
                    *data_complete = false;
                }
            }
            NodeSeed {
                id: item.id,
                title: item.title.clone(),
                duration: duration_days(item, params),
                percent_complete: item.percent_complete.clamp(0.0, 100.0),
                predecessors,
                successors: vec![],
            }
        })
        .collect();

    // explicit successor lists may duplicate the reverse of the
    // predecessor lists; union and mirror them both ways
    let mut predecessor_sets: HashMap<u64, Vec<u64>> = HashMap::new();
    for (pred, succs) in &successor_sets {
        for succ in succs {
            predecessor_sets.entry(*succ).or_default().push(*pred);
        }
    }
    for seed in &mut seeds {
        let mut succs = successor_sets.remove(&seed.id).unwrap_or_default();
        succs.sort_unstable();
        succs.dedup();
        seed.successors = succs;

        let mut preds = predecessor_sets.remove(&seed.id).unwrap_or_default();
        preds.sort_unstable();
        preds.dedup();
        seed.predecessors = preds;
    }
    seeds.sort_by_key(|s| s.id);
    seeds
}

/// A task always has nonzero duration: calendar span when both dates
/// exist, else estimated effort at the working-day rate, else one day
fn duration_days(item: &crate::core::types::WorkItemAggregate, params: &ParameterSet) -> f64 {
    if let (Some(start), Some(due)) = (item.start_date, item.due_date) {
        let span = (due - start).num_days() as f64;
        if span >= 1.0 {
            return span;
        }
    }
    if item.estimated_hours > 0.0 {
        return (item.estimated_hours / params.hours_per_day).ceil();
    }
    1.0
}

#[derive(Debug, Clone, Copy)]
struct NodeTimes {
    earliest_start: f64,
    earliest_finish: f64,
    latest_start: f64,
    latest_finish: f64,
}

/// Forward and backward passes over a topological order. Each node is
/// visited exactly once per pass, so diamond-shaped graphs stay linear.
fn forward_backward(order: &[u64], by_id: &HashMap<u64, &NodeSeed>) -> HashMap<u64, NodeTimes> {
    let mut earliest: HashMap<u64, (f64, f64)> = HashMap::new();
    for id in order {
        let seed = by_id[id];
        let es = seed
            .predecessors
            .iter()
            .map(|p| earliest[p].1)
            .fold(0.0_f64, f64::max);
        earliest.insert(*id, (es, es + seed.duration));
    }

    let project_finish = earliest.values().map(|(_, ef)| *ef).fold(0.0_f64, f64::max);

    let mut latest: HashMap<u64, (f64, f64)> = HashMap::new();
    for id in order.iter().rev() {
        let seed = by_id[id];
        let lf = if seed.successors.is_empty() {
            project_finish
        } else {
            seed.successors
                .iter()
                .map(|s| latest[s].0)
                .fold(f64::INFINITY, f64::min)
        };
        latest.insert(*id, (lf - seed.duration, lf));
    }

    order
        .iter()
        .map(|id| {
            let (es, ef) = earliest[id];
            let (ls, lf) = latest[id];
            (
                *id,
                NodeTimes {
                    earliest_start: es,
                    earliest_finish: ef,
                    latest_start: ls,
                    latest_finish: lf,
                },
            )
        })
        .collect()
}

/// Memoized recursion with a visited set for cyclic graphs. A revisited
/// node is treated as already resolved, which terminates but
/// under-estimates; callers surface `has_cycles` so nobody mistakes the
/// output for a clean schedule.
fn cyclic_fallback(seeds: &[NodeSeed], by_id: &HashMap<u64, &NodeSeed>) -> HashMap<u64, NodeTimes> {
    fn earliest_finish(
        id: u64,
        by_id: &HashMap<u64, &NodeSeed>,
        memo: &mut HashMap<u64, f64>,
        visiting: &mut HashSet<u64>,
    ) -> f64 {
        if let Some(ef) = memo.get(&id) {
            return *ef;
        }
        if !visiting.insert(id) {
            return 0.0;
        }
        let seed = by_id[&id];
        let es = seed
            .predecessors
            .iter()
            .map(|p| earliest_finish(*p, by_id, memo, visiting))
            .fold(0.0_f64, f64::max);
        visiting.remove(&id);
        let ef = es + seed.duration;
        memo.insert(id, ef);
        ef
    }

    fn latest_start(
        id: u64,
        project_finish: f64,
        by_id: &HashMap<u64, &NodeSeed>,
        memo: &mut HashMap<u64, f64>,
        visiting: &mut HashSet<u64>,
    ) -> f64 {
        if let Some(ls) = memo.get(&id) {
            return *ls;
        }
        if !visiting.insert(id) {
            return project_finish;
        }
        let seed = by_id[&id];
        let lf = if seed.successors.is_empty() {
            project_finish
        } else {
            seed.successors
                .iter()
                .map(|s| latest_start(*s, project_finish, by_id, memo, visiting))
                .fold(f64::INFINITY, f64::min)
        };
        visiting.remove(&id);
        let ls = lf - seed.duration;
        memo.insert(id, ls);
        ls
    }

    let mut ef_memo = HashMap::new();
    let mut visiting = HashSet::new();
    for seed in seeds {
        earliest_finish(seed.id, by_id, &mut ef_memo, &mut visiting);
    }
    let project_finish = ef_memo.values().copied().fold(0.0_f64, f64::max);

    let mut ls_memo = HashMap::new();
    visiting.clear();
    for seed in seeds {
        latest_start(seed.id, project_finish, by_id, &mut ls_memo, &mut visiting);
    }

    seeds
        .iter()
        .map(|seed| {
            let ef = ef_memo[&seed.id];
            let ls = ls_memo[&seed.id];
            (
                seed.id,
                NodeTimes {
                    earliest_start: ef - seed.duration,
                    earliest_finish: ef,
                    latest_start: ls,
                    latest_finish: ls + seed.duration,
                },
            )
        })
        .collect()
}

fn assess_risk(
    nodes: &[TaskNode],
    critical_path: &[u64],
    project_duration_days: f64,
    has_cycles: bool,
    data_complete: bool,
) -> (ScheduleRisk, im::Vector<String>) {
    let critical: Vec<&TaskNode> = nodes.iter().filter(|n| n.is_critical).collect();
    let behind = critical
        .iter()
        .filter(|n| n.percent_complete < 50.0)
        .count();
    let average_completion = if critical.is_empty() {
        100.0
    } else {
        critical.iter().map(|n| n.percent_complete).sum::<f64>() / critical.len() as f64
    };

    let mut risk = if behind == 0 && average_completion > 75.0 {
        ScheduleRisk::Low
    } else if behind > 2 || average_completion <= 50.0 {
        ScheduleRisk::High
    } else {
        ScheduleRisk::Medium
    };
    if has_cycles && risk == ScheduleRisk::Low {
        risk = ScheduleRisk::Medium;
    }

    let mut recommendations = im::Vector::new();
    if behind > 0 {
        recommendations.push_back(format!("{behind} critical tasks behind schedule"));
    }
    if !critical_path.is_empty() {
        recommendations.push_back(format!(
            "Critical path spans {:.0} days across {} tasks",
            project_duration_days,
            critical_path.len()
        ));
    }
    if has_cycles {
        recommendations.push_back(
            "Dependency cycle detected; earliest/latest dates under-estimate the true schedule"
                .to_string(),
        );
    }
    if !data_complete {
        recommendations
            .push_back("Some dependency references were invalid and were ignored".to_string());
    }

    (risk, recommendations)
}
