use shadow_rs::ShadowBuilder;

fn main() {
    // Build metadata backs `mailflow --version`
    ShadowBuilder::builder()
        .build()
        .expect("Failed to generate build metadata");
}
