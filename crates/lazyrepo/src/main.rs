fn main() {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("unable to start the async runtime");

    let exit_code = runtime.block_on(lazyrepo_lib::main());
    std::process::exit(exit_code);
}
