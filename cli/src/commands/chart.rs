use anyhow::Result;
use std::process;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use sugarlog_core::models::{ChartData, ChartSnapshot, Granularity};
use sugarlog_core::service::SugarService;

use super::helpers::{json_error, no_neg_zero, parse_date};

pub(crate) fn cmd_chart(
    svc: &SugarService,
    granularity: Granularity,
    user_id: i64,
    start: &str,
    end: &str,
    json: bool,
) -> Result<()> {
    let start = parse_date(Some(start.to_string()), svc.offset())?;
    let end = parse_date(Some(end.to_string()), svc.offset())?;
    let graph = svc.build_chart(user_id, granularity, start, end)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&graph)?);
    } else {
        print_graph(&graph);
    }
    Ok(())
}

pub(crate) fn cmd_graph_show(svc: &SugarService, id: i64, json: bool) -> Result<()> {
    let Some(graph) = svc.get_graph(id)? else {
        if json {
            println!("{}", json_error(&format!("Graph {id} not found")));
        } else {
            eprintln!("Graph {id} not found");
        }
        process::exit(2);
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&graph)?);
    } else {
        print_graph(&graph);
    }
    Ok(())
}

pub(crate) fn cmd_graph_list(svc: &SugarService, user_id: i64, json: bool) -> Result<()> {
    let graphs = svc.list_graphs(user_id)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&graphs)?);
        return Ok(());
    }

    if graphs.is_empty() {
        eprintln!("No graphs for user {user_id}. Use `sugarlog chart` to build one.");
        process::exit(2);
    }

    #[derive(Tabled)]
    struct GraphRow {
        #[tabled(rename = "ID")]
        id: i64,
        #[tabled(rename = "Type")]
        graph_type: String,
        #[tabled(rename = "From")]
        start: String,
        #[tabled(rename = "To")]
        end: String,
        #[tabled(rename = "Buckets")]
        buckets: usize,
        #[tabled(rename = "Total (g)")]
        total: String,
        #[tabled(rename = "Created")]
        created_at: String,
    }

    let rows: Vec<GraphRow> = graphs
        .iter()
        .map(|g| GraphRow {
            id: g.id,
            graph_type: g.graph_type.clone(),
            start: g.start_date.format("%Y-%m-%d").to_string(),
            end: g.end_date.format("%Y-%m-%d").to_string(),
            buckets: g.data_points.len(),
            total: format!("{:.1}", no_neg_zero(g.data_points.total_sugar())),
            created_at: g.created_at.clone(),
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(4..6)).with(Alignment::right()))
        .to_string();
    println!("{table}");
    Ok(())
}

fn print_graph(graph: &ChartSnapshot) {
    #[derive(Tabled)]
    struct BucketRow {
        #[tabled(rename = "Period")]
        period: String,
        #[tabled(rename = "Sugar (g)")]
        total: String,
        #[tabled(rename = "Avg/day (g)")]
        avg: String,
    }

    let fmt = |v: f64| format!("{:.1}", no_neg_zero(v));
    let rows: Vec<BucketRow> = match &graph.data_points {
        ChartData::Daily(points) => points
            .iter()
            .map(|p| BucketRow {
                period: p.day.clone(),
                total: fmt(p.sugar),
                avg: fmt(p.sugar),
            })
            .collect(),
        ChartData::Weekly(points) => points
            .iter()
            .map(|p| BucketRow {
                period: p.week.clone(),
                total: fmt(p.total_sugar),
                avg: fmt(p.avg_per_day),
            })
            .collect(),
        ChartData::Monthly(points) => points
            .iter()
            .map(|p| BucketRow {
                period: p.month.clone(),
                total: fmt(p.total_sugar),
                avg: fmt(p.avg_per_day),
            })
            .collect(),
    };

    println!(
        "=== [{}] {} {} to {} ===\n",
        graph.id,
        graph.graph_type,
        graph.start_date.format("%Y-%m-%d"),
        graph.end_date.format("%Y-%m-%d")
    );
    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(1..3)).with(Alignment::right()))
        .to_string();
    println!("{table}");
    println!(
        "  TOTAL: {:.1}g sugar",
        no_neg_zero(graph.data_points.total_sugar())
    );
}
