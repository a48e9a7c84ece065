#[tokio::main]
async fn main() {
    trust_o_meter::server::run().await;
}
