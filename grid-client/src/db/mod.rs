pub mod grid_metrics_queries;
