use validate_manifests::splitter::split;

fn text(bytes: &[u8]) -> &str {
    std::str::from_utf8(bytes).unwrap()
}

#[test]
fn test_rendered_chart_output_is_attributed_per_template() {
    let rendered = "---\n# Source: web/templates/service.yaml\napiVersion: v1\nkind: Service\n---\n# Source: web/templates/deployment.yaml\napiVersion: apps/v1\nkind: Deployment\n---\napiVersion: v1\nkind: ConfigMap\n";

    let documents = split(rendered.as_bytes(), "stdin");
    let names: Vec<_> = documents.iter().map(|d| d.file_name.as_str()).collect();

    assert_eq!(
        names,
        vec![
            "web/templates/service.yaml",
            "web/templates/deployment.yaml",
            "web/templates/deployment.yaml",
        ]
    );
}

#[test]
fn test_list_items_become_documents() {
    let list = "apiVersion: v1\nkind: List\nitems:\n  - apiVersion: v1\n    kind: Service\n    metadata:\n      name: a\n  - apiVersion: v1\n    kind: Service\n    metadata:\n      name: b\n";

    let documents = split(list.as_bytes(), "list.yaml");
    assert_eq!(documents.len(), 2);
    assert!(text(&documents[0].content).contains("name: a"));
    assert!(text(&documents[1].content).contains("name: b"));
    assert!(documents.iter().all(|d| d.file_name == "list.yaml"));
}

#[test]
fn test_trailing_separator_leaves_an_empty_slot() {
    let documents = split(b"kind: A\n---\n", "a.yaml");
    assert_eq!(documents.len(), 2);
    assert!(documents[1].is_empty());
}

#[test]
fn test_separator_inside_a_line_does_not_split() {
    let documents = split(b"data:\n  banner: a---b\n", "a.yaml");
    assert_eq!(documents.len(), 1);
}

#[test]
fn test_windows_line_ending_in_one_document_keeps_unix_separators() {
    let input = "apiVersion: v1\nkind: ConfigMap\ndata:\n  k: \"x\"\r\n---\napiVersion: v1\nkind: ConfigMap\n";

    let documents = split(input.as_bytes(), "mixed.yaml");
    assert_eq!(documents.len(), 2);
    assert!(text(&documents[0].content).ends_with("k: \"x\""));
    assert!(text(&documents[1].content).starts_with("apiVersion: v1"));
}
