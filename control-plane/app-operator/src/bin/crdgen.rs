use app_operator::crd::AppDeployment;
use kube::core::CustomResourceExt;

fn main() -> anyhow::Result<()> {
    let crd = AppDeployment::crd();
    print!("{}", serde_yaml::to_string(&crd)?);
    Ok(())
}
