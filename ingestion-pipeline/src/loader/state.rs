use state_machines::state_machine;

state_machine! {
    name: LoaderMachine,
    state: LoaderState,
    initial: Ready,
    states: [Ready, Prepared, Loaded, Verified, Completed, Failed],
    events {
        prepare { transition: { from: Ready, to: Prepared } }
        load { transition: { from: Prepared, to: Loaded } }
        verify { transition: { from: Loaded, to: Verified } }
        finish { transition: { from: Verified, to: Completed } }
        abort {
            transition: { from: Ready, to: Failed }
            transition: { from: Prepared, to: Failed }
            transition: { from: Loaded, to: Failed }
            transition: { from: Verified, to: Failed }
            transition: { from: Completed, to: Failed }
        }
    }
}

pub fn ready() -> LoaderMachine<(), Ready> {
    LoaderMachine::new(())
}
