//! Esquema Diesel escrito a mano. Reemplazable con `diesel print-schema`.

diesel::table! {
    workflows (id) {
        id -> Uuid,
        owner_id -> Uuid,
        project_id -> Uuid,
        current_step -> Int4,
        phase -> Text,
        enabled -> Bool,
        step_config -> Jsonb,
        step_outputs -> Jsonb,
        last_error -> Nullable<Text>,
        version -> Int8,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    spaces (id) {
        id -> Uuid,
        workflow_id -> Uuid,
        name -> Text,
        space_type -> Text,
        include_in_generation -> Bool,
        is_excluded -> Bool,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    generation_units (id) {
        id -> Uuid,
        workflow_id -> Uuid,
        space_id -> Uuid,
        asset_type -> Text,
        slot -> Text,
        status -> Text,
        job_type -> Text,
        attempt_count -> Int4,
        locked_approved -> Bool,
        qa_status -> Text,
        pre_rejection_qa_status -> Nullable<Text>,
        qa_report -> Nullable<Jsonb>,
        prompt_text -> Nullable<Text>,
        output_ref -> Nullable<Text>,
        edit_source_ref -> Nullable<Text>,
        correction_text -> Nullable<Text>,
        seed -> Nullable<Int8>,
        retry_patch -> Nullable<Jsonb>,
        rejection_history -> Jsonb,
        last_dispatch_id -> Nullable<Uuid>,
        last_error -> Nullable<Text>,
        version -> Int8,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    workflow_events (seq) {
        seq -> Int8,
        workflow_id -> Uuid,
        ts -> Timestamptz,
        event_type -> Text,
        payload -> Jsonb,
    }
}

diesel::table! {
    calibration_stats (owner_id, project_id, step, category) {
        owner_id -> Uuid,
        project_id -> Uuid,
        step -> Int4,
        category -> Text,
        false_reject_count -> Int8,
        false_approve_count -> Int8,
        confirmed_correct_count -> Int8,
        updated_at -> Timestamptz,
    }
}

diesel::joinable!(spaces -> workflows (workflow_id));
diesel::joinable!(generation_units -> workflows (workflow_id));
diesel::joinable!(generation_units -> spaces (space_id));

diesel::allow_tables_to_appear_in_same_query!(workflows, spaces, generation_units, workflow_events, calibration_stats,);
