use edgebc::betweenness::{reconcile, ResultFrame};
use edgebc::graph::io::{read_delimited, read_matrix_market, Delimiter};
use edgebc::{BetweennessConfig, Client, EdgeBetweenness, Graph, GraphKind, LocalCluster};

fn config() -> BetweennessConfig {
    BetweennessConfig {
        normalized: false,
        ..Default::default()
    }
}

#[test]
fn test_labels_survive_a_distributed_run() {
    // path 900 - (-7) - 42 - 5 with non-contiguous, unsorted labels
    let graph = Graph::from_edge_list(&[900, -7, 42], &[-7, 42, 5], None, GraphKind::Undirected).unwrap();
    let client = Client::with_cluster(LocalCluster::new(2));
    let table = EdgeBetweenness::new(config()).run(&client, &graph, None).unwrap();

    assert_eq!(table.len(), 3);
    assert!(table.rows().all(|(s, d, _)| s < d));
    assert_eq!(table.get(-7, 900), Some(3.0));
    assert_eq!(table.get(-7, 42), Some(4.0));
    assert_eq!(table.get(5, 42), Some(3.0));
}

#[test]
fn test_relabeled_graph_gives_relabeled_result() {
    let labels = [100i64, 7, 55, -3, 12];
    let idx_src = [0usize, 1, 2, 3, 0, 2];
    let idx_dst = [1usize, 2, 3, 4, 4, 4];

    let plain = Graph::from_indices(5, idx_src.to_vec(), idx_dst.to_vec(), None, GraphKind::Directed).unwrap();
    let relabeled = Graph::from_edge_list(
        &idx_src.iter().map(|&i| labels[i]).collect::<Vec<_>>(),
        &idx_dst.iter().map(|&i| labels[i]).collect::<Vec<_>>(),
        None,
        GraphKind::Directed,
    )
    .unwrap();

    let client = Client::with_cluster(LocalCluster::new(3));
    let algorithm = EdgeBetweenness::new(config());
    let expected = algorithm.run(&client, &plain, None).unwrap();
    let actual = algorithm.run(&client, &relabeled, None).unwrap();

    assert_eq!(actual.len(), expected.len());
    for (s, d, b) in expected.rows() {
        let got = actual.get(labels[s as usize], labels[d as usize]);
        assert_eq!(got, Some(b), "edge ({s},{d})");
    }
}

#[test]
fn test_explicit_sources_are_caller_labels() {
    let graph = Graph::from_edge_list(&[10, 20], &[20, 30], None, GraphKind::Directed).unwrap();
    let client = Client::with_cluster(LocalCluster::new(2));
    let table = EdgeBetweenness::new(config()).run(&client, &graph, Some(&[10])).unwrap();
    assert_eq!(table.get(10, 20), Some(2.0));
    assert_eq!(table.get(20, 30), Some(1.0));
}

#[test]
fn test_directed_reconciliation_is_idempotent() {
    let graph = Graph::from_edge_list(&[3, 1, 2], &[1, 2, 3], None, GraphKind::Directed).unwrap();
    let once = EdgeBetweenness::new(config()).run(&Client::local(), &graph, None).unwrap();

    let frame = ResultFrame {
        src: once.src.iter().map(|&s| s as usize).collect(),
        dst: once.dst.iter().map(|&d| d as usize).collect(),
        betweenness: once.betweenness.clone(),
    };
    let twice = reconcile(frame, None, GraphKind::Directed).unwrap();
    assert_eq!(twice, once);
}

#[test]
fn test_loaded_edge_lists_run_end_to_end() {
    let mtx = "%%MatrixMarket matrix coordinate pattern symmetric\n4 4 3\n2 1\n3 2\n4 3\n";
    let edges = read_matrix_market(mtx.as_bytes()).unwrap();
    assert!(edges.symmetric);
    let from_mtx = edges.into_graph(GraphKind::Undirected).unwrap();

    let csv = "0\t1\t1.0\n1\t2\t1.0\n2\t3\t1.0\n";
    let from_csv = read_delimited(csv.as_bytes(), Delimiter::Tab)
        .unwrap()
        .into_graph(GraphKind::Undirected)
        .unwrap();

    let client = Client::with_cluster(LocalCluster::new(2));
    let algorithm = EdgeBetweenness::new(config());
    let a = algorithm.run(&client, &from_mtx, None).unwrap();
    let b = algorithm.run(&client, &from_csv, None).unwrap();

    // Matrix Market indices are shifted to 0-based labels
    assert_eq!(a.get(1, 2), Some(4.0));
    assert_eq!(b.get(1, 2), Some(4.0));
    assert_eq!(a.betweenness, b.betweenness);
}
