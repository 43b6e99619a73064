//! Tree search against a brute-force walk of generated trees

use std::collections::HashSet;
use std::sync::Arc;

use element_locator::{Criteria, Desktop, FuzzyMatcher, LocateError, TreeSearch};
use souldesk_element::{ElementRef, MemoryBackend, MemoryTree, NativeId, NodeSpec};

/// Small deterministic generator so failures reproduce
struct Lcg(u64);

impl Lcg {
    fn next(&mut self, bound: u64) -> u64 {
        self.0 = self.0.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        (self.0 >> 33) % bound
    }
}

const CLASSES: [&str; 4] = ["Button", "Edit", "Text", "Pane"];
const NAMES: [&str; 5] = ["", "OK", "Cancel", "File name:", "Save"];

fn random_node(rng: &mut Lcg, depth: usize) -> NodeSpec {
    let class = CLASSES[rng.next(CLASSES.len() as u64) as usize];
    let name = NAMES[rng.next(NAMES.len() as u64) as usize];
    let mut spec = NodeSpec::control(class, name).process(rng.next(3) as u32);
    if rng.next(5) == 0 {
        spec = spec.hidden();
    }
    if rng.next(4) == 0 {
        spec = spec.disabled();
    }
    if depth < 4 {
        let children = rng.next(4);
        for _ in 0..children {
            spec = spec.child(random_node(rng, depth + 1));
        }
    }
    spec
}

fn random_tree(seed: u64) -> MemoryTree {
    let mut rng = Lcg(seed);
    let windows = (0..3).map(|_| random_node(&mut rng, 0));
    MemoryTree::from_spec(NodeSpec::new("#32769").children(windows)).unwrap()
}

/// Every node below `root` with its depth, breadth-first
fn all_nodes(root: &ElementRef) -> Vec<(ElementRef, usize)> {
    let mut out = Vec::new();
    let mut frontier = vec![(root.clone(), 0usize)];
    while !frontier.is_empty() {
        let mut next = Vec::new();
        for (node, depth) in frontier {
            for child in node.children().unwrap() {
                out.push((child.clone(), depth + 1));
                next.push((child, depth + 1));
            }
        }
        frontier = next;
    }
    out
}

fn brute_force(
    root: &ElementRef,
    max_depth: usize,
    test: impl Fn(&ElementRef) -> bool,
) -> Vec<ElementRef> {
    all_nodes(root)
        .into_iter()
        .filter(|(node, depth)| *depth <= max_depth && test(node))
        .map(|(node, _)| node)
        .collect()
}

type Check = Box<dyn Fn(&ElementRef) -> bool>;

fn check(test: impl Fn(&ElementRef) -> bool + 'static) -> Check {
    Box::new(test)
}

fn criteria_grid() -> Vec<(Criteria, Check)> {
    vec![
        (
            Criteria::new().class_name("Button"),
            check(|e| e.class_name().unwrap() == "Button" && e.is_visible().unwrap()),
        ),
        (
            Criteria::new().title("OK").visible_only(false),
            check(|e| e.name().unwrap() == "OK"),
        ),
        (
            Criteria::new().class_name_re("(Edit|Text)").enabled_only(true),
            check(|e| {
                let class = e.class_name().unwrap();
                (class == "Edit" || class == "Text") && e.is_visible().unwrap() && e.is_enabled().unwrap()
            }),
        ),
        (
            Criteria::new().title_re("Save|Cancel").process(1),
            check(|e| {
                let name = e.name().unwrap();
                (name == "Save" || name == "Cancel")
                    && e.process_id().unwrap().0 == 1
                    && e.is_visible().unwrap()
            }),
        ),
        (
            // partial regex hits must not count: "Save" alone is not a full match of "Sav"
            Criteria::new().title_re("Sav"),
            check(|_| false),
        ),
    ]
}

#[test]
fn find_elements_is_sound_and_complete() {
    for seed in 1..25 {
        let tree = random_tree(seed);
        let search = TreeSearch::new(Arc::new(MemoryBackend::new(tree.clone())));
        let root = tree.root();

        for (criteria, test) in criteria_grid() {
            let deep = criteria.clone().top_level_only(false);
            let found = search.find_elements(None, &deep).unwrap();
            let expected = brute_force(&root, usize::MAX, &test);
            assert_eq!(found, expected, "seed {seed}, {criteria}");

            let top = search.find_elements(None, &criteria).unwrap();
            assert_eq!(top, brute_force(&root, 1, &test), "seed {seed}, top-level {criteria}");

            let unique: HashSet<_> = found.iter().collect();
            assert_eq!(unique.len(), found.len(), "duplicates for seed {seed}");
        }
    }
}

#[test]
fn find_element_cardinality_follows_find_elements() {
    for seed in 1..25 {
        let tree = random_tree(seed);
        let search = TreeSearch::new(Arc::new(MemoryBackend::new(tree.clone())));
        for (criteria, _) in criteria_grid() {
            let criteria = criteria.top_level_only(false);
            let all = search.find_elements(None, &criteria).unwrap();
            match search.find_element(None, &criteria) {
                Ok(element) => assert_eq!(all, vec![element]),
                Err(err) if err.is_not_found() => assert!(all.is_empty()),
                Err(err) if err.is_ambiguous() => {
                    assert!(all.len() > 1);
                    assert_eq!(err.candidates().len(), all.len());
                }
                Err(err) => panic!("unexpected error {err}"),
            }
        }
    }
}

#[test]
fn explicit_depth_bounds_the_walk() {
    let tree = random_tree(7);
    let search = TreeSearch::new(Arc::new(MemoryBackend::new(tree.clone())));
    let root = tree.root();
    for depth in 1..5 {
        let criteria = Criteria::new().visible_only(false).top_level_only(false).depth(depth);
        let found = search.find_elements(None, &criteria).unwrap();
        assert_eq!(found, brute_force(&root, depth, |_| true));
    }
}

fn notepad_desktop() -> (MemoryTree, Desktop) {
    let tree = MemoryTree::from_spec(NodeSpec::new("#32769").children([
        NodeSpec::window("Notepad", "Untitled - Notepad").with_id("np-1").process(100),
        NodeSpec::window("Notepad", "Untitled - Notepad").with_id("np-2").process(200),
        NodeSpec::window("#32770", "About Notepad")
            .with_id("about")
            .process(100)
            .child(NodeSpec::control("Button", "OK").with_id("about-ok")),
    ]))
    .unwrap();
    let desktop = Desktop::new(Arc::new(MemoryBackend::new(tree.clone())));
    (tree, desktop)
}

#[test]
fn notepad_windows() {
    let (_tree, desktop) = notepad_desktop();

    let err = desktop
        .find_element(None, &Criteria::new().class_name("Notepad"))
        .unwrap_err();
    match &err {
        LocateError::Ambiguous { candidates, criteria } => {
            let ids: Vec<&str> = candidates.iter().map(|c| c.native_id.as_str()).collect();
            assert_eq!(ids, vec!["np-1", "np-2"]);
            assert_eq!(criteria, "class_name=\"Notepad\"");
        }
        other => panic!("expected ambiguity, got {other}"),
    }
    assert!(err.to_string().contains("Untitled - Notepad"));

    let about = desktop
        .find_element(None, &Criteria::new().title("About Notepad"))
        .unwrap();
    assert_eq!(about.native_id().as_str(), "about");

    let second = desktop
        .find_element(None, &Criteria::new().class_name("Notepad").process(200))
        .unwrap();
    assert_eq!(second.native_id().as_str(), "np-2");

    let regex = desktop
        .windows(&Criteria::new().title_re(".*Notepad"))
        .unwrap();
    assert_eq!(regex.len(), 3);
}

#[test]
fn handle_lookup_skips_traversal() {
    let (tree, desktop) = notepad_desktop();
    let found = desktop
        .find_elements(None, &Criteria::new().handle("about-ok"))
        .unwrap();
    assert_eq!(found, vec![tree.element(&NativeId::from("about-ok")).unwrap()]);
}

#[test]
fn found_index_and_best_match_compose() {
    let (_tree, desktop) = notepad_desktop();
    let first = desktop
        .find_element(None, &Criteria::new().class_name("Notepad").found_index(0))
        .unwrap();
    assert_eq!(first.native_id().as_str(), "np-1");

    let about = desktop
        .find_element(None, &Criteria::new().best_match("About Notepd"))
        .unwrap();
    assert_eq!(about.native_id().as_str(), "about");

    let strict = Desktop::new(Arc::clone(desktop.backend())).with_matcher(FuzzyMatcher::new(0.99));
    let err = strict
        .find_element(None, &Criteria::new().best_match("About Notepd"))
        .unwrap_err();
    assert!(err.is_match_failure());
}
