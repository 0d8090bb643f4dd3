// Codebase Indexer test infrastructure
//
// Filesystem and database fixtures live in test_helpers; each area below
// gets its own module tree.


// ============================================================================
// CORE - pool, schema, batched deletes, config
// ============================================================================
pub mod core {
    pub mod config;
    pub mod database;
    pub mod pool;
}

// ============================================================================
// REPOSITORIES - event ledger, pipeline state ledgers, workspace registry, file stores
// ============================================================================
pub mod repository {
    pub mod codegraph_state;
    pub mod embedding_state;
    pub mod event;
    pub mod storage;
    pub mod workspace;
}

// ============================================================================
// SCANNER - ignore rules, caps, partial rescans
// ============================================================================
pub mod scanner {
    pub mod ignore_rules;
    pub mod scan;
}

// ============================================================================
// SERVICES - change detection, event cleanup
// ============================================================================
pub mod service {
    pub mod change_detector;
    pub mod event_cleaner;
}
