//! Print the snapshot tree of every VM on one vCenter.
//!
//! ```sh
//! VCENTER_HOST=vc1.example.com VCENTER_USER=administrator@vsphere.local \
//!   VCENTER_PASSWORD=secret cargo run -p vsnap-sdk --example list_snapshots
//! ```

use vsnap_sdk::VsphereClient;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let host = std::env::var("VCENTER_HOST")?;
    let user = std::env::var("VCENTER_USER")?;
    let password = std::env::var("VCENTER_PASSWORD")?;
    let insecure = std::env::var("VCENTER_INSECURE").is_ok();

    let mut client = VsphereClient::builder(host)
        .accept_invalid_certs(insecure)
        .build()?;
    client.login(&user, &password).await?;

    for vm in client.list_virtual_machines().await? {
        let name = client.vm_name(&vm).await?;
        println!("{name}");
        match client.snapshot_info(&vm).await? {
            Some(info) => {
                for (depth, snapshot) in info.walk() {
                    println!(
                        "  {}{} ({})",
                        "  ".repeat(depth),
                        snapshot.name,
                        snapshot.create_time.format("%Y-%m-%d %H:%M:%S")
                    );
                }
            }
            None => println!("  - No snapshots found."),
        }
    }

    client.logout().await?;
    Ok(())
}
